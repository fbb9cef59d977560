//! Parameter, result and recipe types.
//!
//! Params and results derive Serialize + Deserialize so they can
//! round-trip through the JSON interchange used by the CLI and the
//! Python binding.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rules::RuleTables;

// -- Recipe --------------------------------------------------------

/// Ordered root-relative leaf paths, one per leaf position visited.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe {
    lines: Vec<String>,
}

impl Recipe {
    pub fn new(lines: Vec<String>) -> Self {
        Recipe { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Text form consumed by the compositor. The optional header is the
    /// `root_dir: <path>` line; it is never part of the fingerprint.
    pub fn render(&self, root_dir: Option<&str>) -> String {
        let mut out = Vec::with_capacity(self.lines.len() + 1);
        if let Some(root) = root_dir {
            out.push(format!("root_dir: {root}"));
        }
        out.extend(self.lines.iter().cloned());
        out.join("\n")
    }
}

// -- Conventions ---------------------------------------------------

fn default_head_root() -> String {
    "00_heads_assets".into()
}

fn default_head_plus_eyes() -> String {
    "09_head_gadget_plus_eyes".into()
}

fn default_skins_dir() -> String {
    "02_body_skins".into()
}

fn default_skins_marker() -> String {
    "skins".into()
}

fn default_ignored_files() -> Vec<String> {
    vec![".DS_Store".into(), "Thumbs.db".into(), "desktop.ini".into()]
}

/// Directory names that carry meaning beyond plain classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConventions {
    /// Node that triggers the head-accessory draw instead of a descent.
    #[serde(default = "default_head_root")]
    pub head_root: String,
    /// Leaf position filtered by the chosen head accessory.
    #[serde(default = "default_head_plus_eyes")]
    pub head_plus_eyes: String,
    /// Leaf directory whose choice sets the skin stream.
    #[serde(default = "default_skins_dir")]
    pub skins_dir: String,
    /// Segments containing this token are filtered by the active stream.
    #[serde(default = "default_skins_marker")]
    pub skins_marker: String,
    #[serde(default = "default_ignored_files")]
    pub ignored_files: Vec<String>,
}

impl Default for CatalogConventions {
    fn default() -> Self {
        Self {
            head_root: default_head_root(),
            head_plus_eyes: default_head_plus_eyes(),
            skins_dir: default_skins_dir(),
            skins_marker: default_skins_marker(),
            ignored_files: default_ignored_files(),
        }
    }
}

/// What to do when the stream filter leaves a skins position empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamFallback {
    /// The branch contributes no leaf.
    #[default]
    Terminate,
    /// Choose among the unfiltered files instead.
    Unfiltered,
}

// -- Engine I/O ----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub catalog_root: PathBuf,
    /// Persisted ledger. `None` keeps the ledger in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Retry cap on fingerprint collisions. `None` retries forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub stream_fallback: StreamFallback,
    #[serde(default)]
    pub conventions: CatalogConventions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<RuleTables>,
}

impl GenerationParams {
    pub fn new(catalog_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog_root: catalog_root.into(),
            ledger_path: None,
            seed: None,
            max_attempts: None,
            stream_fallback: StreamFallback::default(),
            conventions: CatalogConventions::default(),
            rules: None,
        }
    }

    pub fn rule_tables(&self) -> RuleTables {
        self.rules.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub root_dir: String,
    pub recipe: Recipe,
    pub fingerprint: String,
    #[serde(default)]
    pub attempts: u32,
    pub seed: u64,
}

// -- Tests ---------------------------------------------------------

//! Catalog sources and node classification.
//!
//! A catalog is a read-only tree. Classification is encoded purely in
//! names: a node with two-digit-prefixed sub-directories is an overlay
//! (visit every layer), a node with any other sub-directories is a
//! variant group (choose one), and a node with only files is a leaf
//! position (choose one file).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{GenerateError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Group,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl CatalogEntry {
    pub fn group(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: EntryKind::Group }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: EntryKind::File }
    }
}

/// Anything that can list the children of a catalog node.
///
/// Paths are the segments below the root; the empty path is the root
/// itself. Implementations may cache, since the catalog is immutable
/// for the lifetime of a source.
pub trait CatalogSource {
    /// Name of the root node, which is the first segment of every branch.
    fn root_name(&self) -> &str;

    /// Human-readable location of the root, used as the recipe header.
    fn location(&self) -> String {
        self.root_name().to_string()
    }

    fn children(&self, path: &[String]) -> Result<Arc<[CatalogEntry]>>;
}

// -- Classification ------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Overlay,
    VariantGroup,
    Leaf,
}

/// True for names starting with two ASCII digits ("01_body", "10_x").
pub fn has_overlay_prefix(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() >= 2 && b[0].is_ascii_digit() && b[1].is_ascii_digit()
}

/// Checked in order Overlay, VariantGroup, Leaf; exactly one holds.
pub fn classify(entries: &[CatalogEntry]) -> NodeKind {
    let mut has_groups = false;
    for e in entries {
        if e.kind != EntryKind::Group {
            continue;
        }
        if has_overlay_prefix(&e.name) {
            return NodeKind::Overlay;
        }
        has_groups = true;
    }
    if has_groups {
        NodeKind::VariantGroup
    } else {
        NodeKind::Leaf
    }
}

/// Numeric-prefixed sub-directories in ascending name order.
pub fn overlay_layers(entries: &[CatalogEntry]) -> Vec<String> {
    let mut layers: Vec<String> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Group && has_overlay_prefix(&e.name))
        .map(|e| e.name.clone())
        .collect();
    layers.sort();
    layers
}

pub fn sub_groups(entries: &[CatalogEntry]) -> Vec<String> {
    let mut groups: Vec<String> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::Group)
        .map(|e| e.name.clone())
        .collect();
    groups.sort();
    groups
}

/// Files at a node, minus OS metadata artifacts.
pub fn leaf_files(entries: &[CatalogEntry], ignored: &[String]) -> Vec<String> {
    let mut files: Vec<String> = entries
        .iter()
        .filter(|e| e.kind == EntryKind::File && !ignored.iter().any(|i| *i == e.name))
        .map(|e| e.name.clone())
        .collect();
    files.sort();
    files
}

// -- Filesystem source ---------------------------------------------

/// Directory-tree catalog with an in-memory listing cache.
pub struct FsCatalog {
    root: PathBuf,
    root_name: String,
    cache: Mutex<HashMap<Vec<String>, Arc<[CatalogEntry]>>>,
}

impl FsCatalog {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(GenerateError::MissingRoot(root.to_path_buf()));
        }
        let root = fs::canonicalize(root).map_err(|e| GenerateError::io(root, e))?;
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            root,
            root_name,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Absolute path of the catalog root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_node(&self, path: &[String]) -> Result<Vec<CatalogEntry>> {
        let dir = path.iter().fold(self.root.clone(), |acc, s| acc.join(s));
        debug!("Looking into {}", dir.display());
        let mut entries = Vec::new();
        for item in fs::read_dir(&dir).map_err(|e| GenerateError::io(&dir, e))? {
            let item = item.map_err(|e| GenerateError::io(&dir, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            // Follow symlinks, like a plain is-dir / is-file probe would.
            let full = item.path();
            if full.is_dir() {
                entries.push(CatalogEntry::group(name));
            } else if full.is_file() {
                entries.push(CatalogEntry::file(name));
            }
        }
        Ok(entries)
    }
}

impl CatalogSource for FsCatalog {
    fn root_name(&self) -> &str {
        &self.root_name
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn children(&self, path: &[String]) -> Result<Arc<[CatalogEntry]>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(path) {
            return Ok(Arc::clone(hit));
        }
        let listed: Arc<[CatalogEntry]> = self.read_node(path)?.into();
        cache.insert(path.to_vec(), Arc::clone(&listed));
        Ok(listed)
    }
}

// -- In-memory source ----------------------------------------------

/// Catalog built from slash-separated paths; used for fixtures and
/// benchmarks.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    root_name: String,
    nodes: BTreeMap<Vec<String>, BTreeMap<String, EntryKind>>,
}

impl MemoryCatalog {
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(Vec::new(), BTreeMap::new());
        Self {
            root_name: root_name.into(),
            nodes,
        }
    }

    pub fn with_files<I, S>(root_name: impl Into<String>, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut catalog = Self::new(root_name);
        for f in files {
            catalog.add_file(f.as_ref());
        }
        catalog
    }

    /// Add `a/b/file.png`, creating `a` and `a/b` as groups.
    pub fn add_file(&mut self, path: &str) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if let Some((file, dirs)) = segments.split_last() {
            let parent = self.ensure_groups(dirs);
            self.nodes
                .entry(parent)
                .or_default()
                .insert((*file).to_string(), EntryKind::File);
        }
    }

    /// Add an (possibly empty) group at `a/b`.
    pub fn add_group(&mut self, path: &str) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        self.ensure_groups(&segments);
    }

    fn ensure_groups(&mut self, dirs: &[&str]) -> Vec<String> {
        let mut current: Vec<String> = Vec::new();
        for d in dirs {
            self.nodes
                .entry(current.clone())
                .or_default()
                .insert((*d).to_string(), EntryKind::Group);
            current.push((*d).to_string());
            self.nodes.entry(current.clone()).or_default();
        }
        current
    }
}

impl CatalogSource for MemoryCatalog {
    fn root_name(&self) -> &str {
        &self.root_name
    }

    fn children(&self, path: &[String]) -> Result<Arc<[CatalogEntry]>> {
        let node = self.nodes.get(path).ok_or_else(|| {
            GenerateError::integrity(path.join("/"), "no such catalog node")
        })?;
        Ok(node
            .iter()
            .map(|(name, kind)| CatalogEntry { name: name.clone(), kind: *kind })
            .collect())
    }
}

// -- Tests ---------------------------------------------------------

//! Recursive descent over the catalog producing one recipe.
//!
//! Overlay nodes fan out: every numeric layer is visited in ascending
//! name order from the same branch position, so siblings never see
//! each other's suffix. Variant groups choose exactly one child. Leaf
//! positions choose exactly one file and append it to the recipe.

use std::path::Path;

use tracing::{debug, warn};

use crate::catalog::{
    classify, leaf_files, overlay_layers, sub_groups, CatalogEntry, CatalogSource, NodeKind,
};
use crate::error::{GenerateError, Result};
use crate::prng::Pcg32;
use crate::rules::{RuleBook, SelectionState};
use crate::sampler;
use crate::types::{CatalogConventions, Recipe, StreamFallback};

/// Outcome of one walk: the repaired recipe plus the signatures the
/// walk accumulated.
#[derive(Debug, Clone)]
pub struct Walk {
    pub recipe: Recipe,
    pub state: SelectionState,
}

/// Mutable context for a single walk.
struct Cursor<'r> {
    rng: &'r mut Pcg32,
    state: SelectionState,
    /// Root name first, current node last.
    branch: Vec<String>,
    lines: Vec<String>,
}

impl Cursor<'_> {
    fn node_path(&self) -> &[String] {
        &self.branch[1..]
    }

    fn display_path(&self) -> String {
        self.branch.join("/")
    }
}

pub struct Walker<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
    rules: &'a RuleBook,
    conventions: &'a CatalogConventions,
    fallback: StreamFallback,
}

impl<'a, C: CatalogSource + ?Sized> Walker<'a, C> {
    pub fn new(
        catalog: &'a C,
        rules: &'a RuleBook,
        conventions: &'a CatalogConventions,
        fallback: StreamFallback,
    ) -> Self {
        Self { catalog, rules, conventions, fallback }
    }

    /// Walk the whole catalog once with a fresh selection state.
    pub fn walk(&self, rng: &mut Pcg32) -> Result<Walk> {
        let mut cursor = Cursor {
            rng,
            state: SelectionState::default(),
            branch: vec![self.catalog.root_name().to_string()],
            lines: Vec::new(),
        };
        self.visit(&mut cursor)?;

        let Cursor { state, lines, .. } = cursor;
        let lines = self.rules.repair_recipe(lines, &state);
        Ok(Walk { recipe: Recipe::new(lines), state })
    }

    fn visit(&self, cx: &mut Cursor<'_>) -> Result<()> {
        debug!(branch = %cx.display_path(), "visiting");
        let entries = self.catalog.children(cx.node_path())?;

        let is_head_root = cx
            .branch
            .last()
            .is_some_and(|name| *name == self.conventions.head_root);
        if is_head_root {
            return self.choose_head_gadget(&entries, cx);
        }

        match classify(&entries) {
            NodeKind::Overlay => {
                let layers = overlay_layers(&entries);
                debug!(?layers, "found overlays");
                for layer in layers {
                    let mark = cx.branch.len();
                    cx.branch.push(layer);
                    self.visit(cx)?;
                    cx.branch.truncate(mark);
                }
                Ok(())
            }
            NodeKind::VariantGroup => {
                let chosen = self.pick_variant(&entries, cx)?;
                debug!(chosen = chosen.as_str(), "chosen variant");
                let mark = cx.branch.len();
                cx.branch.push(chosen);
                self.visit(cx)?;
                cx.branch.truncate(mark);
                Ok(())
            }
            NodeKind::Leaf => self.pick_leaf(&entries, cx),
        }
    }

    fn pick_variant(&self, entries: &[CatalogEntry], cx: &mut Cursor<'_>) -> Result<String> {
        let candidates = sub_groups(entries);
        // Rarity-weighted groups are sampled whole; rules narrow the rest.
        let pool = if sampler::uses_rarity(&candidates) {
            candidates
        } else {
            self.rules.filter_variants(&candidates, &cx.state)
        };
        sampler::sample(cx.rng, &pool).cloned().ok_or_else(|| {
            GenerateError::integrity(cx.display_path(), "no variant left to choose from")
        })
    }

    fn pick_leaf(&self, entries: &[CatalogEntry], cx: &mut Cursor<'_>) -> Result<()> {
        let all = leaf_files(entries, &self.conventions.ignored_files);
        if all.is_empty() {
            return Err(GenerateError::integrity(cx.display_path(), "leaf position has no files"));
        }
        let segment = cx.branch.last().cloned().unwrap_or_default();

        let potential = match cx.state.skin_stream.as_deref() {
            Some(stream) if segment.contains(&self.conventions.skins_marker) => {
                let on_stream: Vec<String> = all
                    .iter()
                    .filter(|f| self.rules.stream_of(f).as_deref() == Some(stream))
                    .cloned()
                    .collect();
                debug!(stream, ?on_stream, "leaves after stream filter");
                if on_stream.is_empty() && self.fallback == StreamFallback::Unfiltered {
                    all
                } else {
                    on_stream
                }
            }
            _ => all,
        };

        let in_head_position = cx
            .branch
            .iter()
            .any(|s| s.contains(&self.conventions.head_plus_eyes));
        let filtered = if in_head_position {
            self.rules.filter_head_accessory(&potential, &cx.state)
        } else {
            potential
        };

        if filtered.is_empty() {
            warn!(branch = %cx.display_path(), "no compatible leaf, branch contributes nothing");
            return Ok(());
        }

        let leaves = if sampler::uses_rarity(&filtered) {
            filtered
        } else {
            self.rules.filter_leaves(&filtered, &cx.state)
        };
        let leaf = sampler::sample(cx.rng, &leaves).cloned().ok_or_else(|| {
            GenerateError::integrity(cx.display_path(), "no leaf left to choose from")
        })?;

        let sets_stream = segment.eq_ignore_ascii_case(&self.conventions.skins_dir);
        self.rules.observe_leaf(&leaf, sets_stream, &mut cx.state);

        let mut line = cx.node_path().join("/");
        if !line.is_empty() {
            line.push('/');
        }
        line.push_str(&leaf);
        debug!(line = line.as_str(), "found final leaf");
        cx.lines.push(line);
        Ok(())
    }

    /// One uniform draw of a sub-group, then of a file inside it. The
    /// file stem becomes the head accessory; nothing joins the recipe.
    fn choose_head_gadget(&self, entries: &[CatalogEntry], cx: &mut Cursor<'_>) -> Result<()> {
        let groups = sub_groups(entries);
        let group = sampler::uniform_pick(cx.rng, &groups).cloned().ok_or_else(|| {
            GenerateError::integrity(cx.display_path(), "head catalog has no groups")
        })?;

        let mut path = cx.node_path().to_vec();
        path.push(group);
        let files = leaf_files(&self.catalog.children(&path)?, &self.conventions.ignored_files);
        let file = sampler::uniform_pick(cx.rng, &files).ok_or_else(|| {
            GenerateError::integrity(
                format!("{}/{}", cx.display_path(), path.last().map(String::as_str).unwrap_or("")),
                "head accessory group has no files",
            )
        })?;

        let gadget = Path::new(file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        debug!(gadget = gadget.as_str(), "head gadget chosen");
        cx.state.head_gadget = Some(gadget);
        Ok(())
    }
}

// -- Tests ---------------------------------------------------------

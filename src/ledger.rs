//! Recipe fingerprints and the ledger of recipes already produced.
//!
//! The ledger is a sorted, de-duplicated list of fingerprints, one per
//! line on disk. It is loaded once, searched with binary search, and
//! rewritten in full (atomically, under an exclusive lock) after every
//! insertion. A sibling `<ledger>.lock` file carries the advisory lock
//! and stays on disk between runs.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use md5::{Digest, Md5};
use tracing::{debug, info, warn};

use crate::error::{GenerateError, Result};
use crate::types::Recipe;

// -- Fingerprint ---------------------------------------------------

/// MD5 hex digest over the concatenated recipe lines. Order-sensitive;
/// no separators, matching existing ledgers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(recipe: &Recipe) -> Self {
        let mut hasher = Md5::new();
        for line in recipe.lines() {
            hasher.update(line.as_bytes());
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Ledger --------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: Vec<String>,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Ledger that never touches disk.
    pub fn in_memory<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<String> = entries.into_iter().map(Into::into).collect();
        entries.sort();
        entries.dedup();
        Self { entries, path: None }
    }

    /// Load the ledger at `path`, creating an empty one if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = non_empty_parent(path) {
            fs::create_dir_all(parent).map_err(|e| GenerateError::io(parent, e))?;
        }
        let creating = !path.exists();
        let _lock = lock_ledger(path, creating)?;
        if creating && !path.exists() {
            fs::write(path, "").map_err(|e| GenerateError::io(path, e))?;
            info!("created empty ledger at {}", path.display());
        }
        let text = fs::read_to_string(path).map_err(|e| GenerateError::io(path, e))?;
        let mut ledger = Self::in_memory(text.lines().map(str::trim).filter(|l| !l.is_empty()));
        ledger.path = Some(path.to_path_buf());
        debug!(entries = ledger.len(), "loaded ledger {}", path.display());
        Ok(ledger)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn search(&self, fingerprint: &str) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.as_str().cmp(fingerprint))
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.search(fingerprint).is_ok()
    }

    /// Insert at the sorted position. Returns false if already present.
    pub fn insert(&mut self, fingerprint: &str) -> bool {
        match self.search(fingerprint) {
            Ok(_) => false,
            Err(pos) => {
                self.entries.insert(pos, fingerprint.to_string());
                true
            }
        }
    }

    /// Returns false if `fingerprint` was not present.
    pub fn remove(&mut self, fingerprint: &str) -> bool {
        match self.search(fingerprint) {
            Ok(pos) => {
                self.entries.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Rewrite the backing file in full. No-op for in-memory ledgers.
    pub fn persist(&self) -> Result<()> {
        let path = match &self.path {
            Some(p) => p,
            None => return Ok(()),
        };
        let _lock = lock_ledger(path, true)?;
        let parent = non_empty_parent(path).unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| GenerateError::io(parent, e))?;
        for entry in &self.entries {
            writeln!(tmp, "{entry}").map_err(|e| GenerateError::io(tmp.path(), e))?;
        }
        tmp.as_file_mut()
            .sync_all()
            .map_err(|e| GenerateError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| GenerateError::io(path, e.error))?;
        debug!(entries = self.entries.len(), "persisted ledger {}", path.display());
        Ok(())
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Sibling `<ledger>.lock`, held until the returned file is dropped.
/// The lock file itself is left in place.
fn lock_ledger(path: &Path, exclusive: bool) -> Result<File> {
    let mut lock_name = path.as_os_str().to_owned();
    lock_name.push(".lock");
    let lock_path = PathBuf::from(lock_name);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| GenerateError::io(&lock_path, e))?;
    let locked = if exclusive { file.lock_exclusive() } else { file.lock_shared() };
    locked.map_err(|e| GenerateError::io(&lock_path, e))?;
    Ok(file)
}

// -- Retry loop ----------------------------------------------------

#[derive(Debug, Clone)]
pub struct UniqueRecipe {
    pub recipe: Recipe,
    pub fingerprint: Fingerprint,
    /// Generation attempts used, including the successful one.
    pub attempts: u32,
}

/// Generate until a recipe's fingerprint is not in the ledger, then
/// record and persist it.
///
/// `generate` receives the zero-based attempt number and must start
/// from scratch each time. Its errors abort immediately: only
/// fingerprint collisions are retried. `max_attempts` of `None`
/// retries without bound. Taking the ledger by `&mut` keeps the
/// search + insert step a single critical section.
pub fn ensure_unique<F>(
    ledger: &mut Ledger,
    max_attempts: Option<u32>,
    mut generate: F,
) -> Result<UniqueRecipe>
where
    F: FnMut(u32) -> Result<Recipe>,
{
    let mut attempts = 0u32;
    loop {
        if max_attempts.is_some_and(|cap| attempts >= cap) {
            return Err(GenerateError::RetriesExhausted { attempts });
        }
        let recipe = generate(attempts)?;
        attempts += 1;

        let fingerprint = Fingerprint::of(&recipe);
        if !ledger.insert(fingerprint.as_str()) {
            warn!(%fingerprint, attempts, "recipe already produced, retrying");
            continue;
        }
        if let Err(e) = ledger.persist() {
            ledger.remove(fingerprint.as_str());
            return Err(e);
        }
        info!(%fingerprint, attempts, "permutation completed");
        return Ok(UniqueRecipe { recipe, fingerprint, attempts });
    }
}

// -- Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(lines: &[&str]) -> Recipe {
        Recipe::new(lines.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn fingerprint_is_md5_of_concatenation() {
        assert_eq!(
            Fingerprint::of(&Recipe::default()).as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            Fingerprint::of(&recipe(&["a", "bc"])).as_str(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_ne!(
            Fingerprint::of(&recipe(&["x", "y"])),
            Fingerprint::of(&recipe(&["y", "x"]))
        );
    }

    #[test]
    fn insert_keeps_order() {
        let mut ledger = Ledger::in_memory(["abd", "aaa"]);
        assert!(ledger.insert("abc"));
        assert_eq!(ledger.entries(), ["aaa", "abc", "abd"]);
        assert!(!ledger.insert("abc"));
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn retries_past_seeded_fingerprints() {
        let seeded: Vec<String> = (0..5)
            .map(|i| Fingerprint::of(&recipe(&[&format!("r{i}")])).into_string())
            .collect();
        let mut ledger = Ledger::in_memory(seeded.clone());

        let unique = ensure_unique(&mut ledger, None, |attempt| {
            Ok(recipe(&[&format!("r{attempt}")]))
        })
        .unwrap();

        assert_eq!(unique.attempts, 6);
        assert_eq!(unique.recipe, recipe(&["r5"]));
        assert!(!seeded.contains(&unique.fingerprint.as_str().to_string()));
        assert!(ledger.contains(unique.fingerprint.as_str()));
        assert_eq!(ledger.len(), 6);
    }

    #[test]
    fn retry_cap_is_honored() {
        let taken = Fingerprint::of(&recipe(&["same"])).into_string();
        let mut ledger = Ledger::in_memory([taken]);
        let err = ensure_unique(&mut ledger, Some(3), |_| Ok(recipe(&["same"]))).unwrap_err();
        assert!(matches!(err, GenerateError::RetriesExhausted { attempts: 3 }));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn generation_errors_are_not_retried() {
        let mut ledger = Ledger::in_memory(Vec::<String>::new());
        let mut calls = 0;
        let err = ensure_unique(&mut ledger, None, |_| {
            calls += 1;
            Err(GenerateError::integrity("program/01_x", "empty"))
        })
        .unwrap_err();
        assert!(matches!(err, GenerateError::CatalogIntegrity { .. }));
        assert_eq!(calls, 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn persisted_ledger_reloads_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("trees.txt");

        let mut ledger = Ledger::open(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(path.exists());

        for name in ["zeta", "alpha", "mid"] {
            ensure_unique(&mut ledger, None, |_| Ok(recipe(&[name]))).unwrap();
        }

        let reloaded = Ledger::open(&path).unwrap();
        assert_eq!(reloaded.entries(), ledger.entries());
        let on_disk = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = on_disk.lines().collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn failed_persist_leaves_ledger_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state");
        let path = state.join("trees.txt");
        let mut ledger = Ledger::open(&path).unwrap();
        fs::remove_dir_all(&state).unwrap();

        let err = ensure_unique(&mut ledger, None, |_| Ok(recipe(&["lost"]))).unwrap_err();
        assert!(matches!(err, GenerateError::Io { .. }));
        assert!(ledger.is_empty());
        assert!(!ledger.contains(Fingerprint::of(&recipe(&["lost"])).as_str()));
    }

    #[test]
    fn remove_drops_only_present_entries() {
        let mut ledger = Ledger::in_memory(["aaa", "bbb"]);
        assert!(ledger.remove("aaa"));
        assert!(!ledger.remove("aaa"));
        assert_eq!(ledger.entries(), ["bbb"]);
    }

    #[test]
    fn blank_lines_are_ignored_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trees.txt");
        fs::write(&path, "bbb\n\naaa").unwrap();
        let ledger = Ledger::open(&path).unwrap();
        assert_eq!(ledger.entries(), ["aaa", "bbb"]);
    }
}

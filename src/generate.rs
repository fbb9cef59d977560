//! Recipe generation engine.
//!
//! An `Engine` owns the catalog, the compiled rules and the ledger for
//! one process run. Each generation attempt walks the catalog with its
//! own PCG32 stream (same seed, increasing sequence number), so a fixed
//! seed reproduces the whole run, retries included.

use tracing::{debug, info};

use crate::catalog::{CatalogSource, FsCatalog};
use crate::error::Result;
use crate::ledger::{ensure_unique, Ledger};
use crate::prng::Pcg32;
use crate::rules::RuleBook;
use crate::types::{GenerationParams, GenerationResult};
use crate::walker::Walker;

pub struct Engine<C: CatalogSource = FsCatalog> {
    catalog: C,
    rules: RuleBook,
    ledger: Ledger,
    params: GenerationParams,
    seed: u64,
    next_stream: u64,
}

impl Engine<FsCatalog> {
    /// Open the catalog and ledger named by `params`.
    pub fn open(params: GenerationParams) -> Result<Self> {
        let catalog = FsCatalog::open(&params.catalog_root)?;
        let ledger = match &params.ledger_path {
            Some(path) => Ledger::open(path)?,
            None => Ledger::default(),
        };
        Self::with_parts(catalog, ledger, params)
    }
}

impl<C: CatalogSource> Engine<C> {
    pub fn with_parts(catalog: C, ledger: Ledger, params: GenerationParams) -> Result<Self> {
        let rules = RuleBook::compile(&params.rule_tables())?;
        let seed = params.seed.unwrap_or_else(Pcg32::entropy_seed);
        info!(
            root = %catalog.location(),
            seed,
            ledger_entries = ledger.len(),
            "engine ready"
        );
        Ok(Self {
            catalog,
            rules,
            ledger,
            params,
            seed,
            next_stream: 0,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Produce one recipe that is not yet in the ledger and record it.
    pub fn next_unique(&mut self) -> Result<GenerationResult> {
        let walker = Walker::new(
            &self.catalog,
            &self.rules,
            &self.params.conventions,
            self.params.stream_fallback,
        );
        let seed = self.seed;
        let stream = &mut self.next_stream;

        let unique = ensure_unique(&mut self.ledger, self.params.max_attempts, |attempt| {
            let mut rng = Pcg32::new(seed, *stream);
            debug!(attempt, stream = *stream, "generating permutation");
            *stream += 1;
            Ok(walker.walk(&mut rng)?.recipe)
        })?;

        Ok(GenerationResult {
            root_dir: self.catalog.location(),
            recipe: unique.recipe,
            fingerprint: unique.fingerprint.into_string(),
            attempts: unique.attempts,
            seed,
        })
    }
}

/// One-shot generation from params: open, generate once, persist.
pub fn generate(params: &GenerationParams) -> Result<GenerationResult> {
    Engine::open(params.clone())?.next_unique()
}

/// JSON-in, JSON-out wrapper used by the Python binding.
pub fn generate_json(params_json: &str) -> Result<String> {
    let params: GenerationParams = serde_json::from_str(params_json)?;
    let result = generate(&params)?;
    Ok(serde_json::to_string(&result)?)
}

// -----------------------------------------------------------------
// Tests
// -----------------------------------------------------------------

//! Constrained random composition of layered trait catalogs.
//!
//! Walks a catalog of trait variants, picks one mutually compatible
//! combination (a recipe) using rarity weighting and cross-trait rules,
//! and guarantees through a persisted fingerprint ledger that no recipe
//! is produced twice.
//!
//! With the `python` feature the crate also builds as a Python module
//! exposing `generate_json`, which takes a JSON `GenerationParams`
//! string and returns a JSON `GenerationResult` string.

pub mod catalog;
pub mod error;
pub mod generate;
pub mod ledger;
pub mod prng;
pub mod rules;
pub mod sampler;
pub mod types;
pub mod walker;

pub use error::{GenerateError, Result};
pub use generate::{generate, Engine};
pub use types::{GenerationParams, GenerationResult, Recipe};

#[cfg(feature = "python")]
mod python {
    use pyo3::prelude::*;

    /// Generate one unique recipe.
    ///
    /// Takes a JSON string matching `GenerationParams` and returns a
    /// JSON string matching `GenerationResult`.
    #[pyfunction]
    fn generate_json(params_json: &str) -> PyResult<String> {
        crate::generate::generate_json(params_json).map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
                "Recipe generation failed: {e}"
            ))
        })
    }

    /// Recipe engine, importable from Python.
    #[pymodule]
    fn recipe_engine(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(generate_json, m)?)?;
        Ok(())
    }
}

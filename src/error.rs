//! Error types for recipe generation.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// A mandatory choice had nothing to choose from. Retrying cannot
    /// fix this: the catalog itself is malformed.
    #[error("catalog integrity error at '{path}': {reason}")]
    CatalogIntegrity { path: String, reason: String },

    #[error("catalog root {0} doesn't exist")]
    MissingRoot(PathBuf),

    #[error("no unique recipe found after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid parameters: {0}")]
    Params(#[from] serde_json::Error),
}

impl GenerateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenerateError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn integrity(path: impl Into<String>, reason: impl Into<String>) -> Self {
        GenerateError::CatalogIntegrity {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateError>;

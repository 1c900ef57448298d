use std::path::PathBuf;
use thiserror::Error;

use permutator_core::BackendFailure;

/// Failures of the compiler process itself, as opposed to shader errors
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("could not run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("{tool} reported success but wrote no output to {}", path.display())]
    MissingOutput { tool: String, path: PathBuf },

    #[error("invalid SPIR-V: {0}")]
    Reflection(String),
}

impl From<BackendError> for BackendFailure {
    fn from(error: BackendError) -> Self {
        BackendFailure::new(error.to_string())
    }
}

//! Error taxonomy for a permutation build
//!
//! Every variant is fatal for the run. Backend warnings are not errors; they
//! are logged where they are produced and never reach this type.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed option declaration or unsupported setting
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The backend rejected a permutation
    #[error("failed to compile {} (permutation {key:#x}, {defines}):\n{diagnostics}", path.display())]
    Compile {
        path: PathBuf,
        key: u32,
        defines: String,
        diagnostics: String,
    },

    /// An input or output file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend itself could not run (missing executable, bad output, ...)
    #[error("compiler backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    /// Scheduler bookkeeping ended in an inconsistent state
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by shader code rather than the environment
    pub fn is_compile_error(&self) -> bool {
        matches!(self, Error::Compile { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_mentions_path_and_key() {
        let err = Error::Compile {
            path: PathBuf::from("shaders/blur.hlsl"),
            key: 5,
            defines: "QUALITY=HIGH".to_string(),
            diagnostics: "error X3000: syntax error".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("shaders/blur.hlsl"));
        assert!(message.contains("0x5"));
        assert!(message.contains("X3000"));
        assert!(err.is_compile_error());
    }

    #[test]
    fn io_error_keeps_source() {
        let err = Error::io(
            "out/missing.h",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_compile_error());
    }
}

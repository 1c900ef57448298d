//! The contract between the scheduler and a shader compiler
//!
//! Backends are shared by every worker thread, so implementations must be
//! `Send + Sync` and keep per-compile state on the stack.

use std::path::PathBuf;
use thiserror::Error;

use crate::generator::Permutation;
use crate::option::Define;
use crate::reflection::ReflectionData;

/// Settings shared by every permutation of one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerArguments {
    /// Constant defines applied to every permutation
    pub defines: Vec<Define>,
    pub include_paths: Vec<PathBuf>,
    /// Passed to the compiler verbatim
    pub extra: Vec<String>,
}

/// Output of a successful compile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledBinary {
    pub binary: Vec<u8>,
    /// Non-fatal compiler diagnostics
    pub warnings: Vec<String>,
    /// The command line that produced the binary, minus temporary paths
    pub arguments: Vec<String>,
    /// Files the compiler reported reading, beyond the textual include scan
    pub dependencies: Vec<PathBuf>,
}

/// The backend could not do its job at all
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendFailure {
    pub message: String,
}

impl BackendFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileFailure {
    /// The compiler ran and rejected the shader
    #[error("{0}")]
    Diagnostics(String),

    #[error(transparent)]
    Infrastructure(#[from] BackendFailure),
}

pub trait CompilerBackend: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Compile one permutation
    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure>;

    /// Reflect the resources of a compiled binary. `None` means the backend
    /// cannot reflect this kind of output.
    fn extract_reflection(&self, _binary: &[u8]) -> Result<Option<ReflectionData>, BackendFailure> {
        Ok(None)
    }
}

impl<T: CompilerBackend + ?Sized> CompilerBackend for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure> {
        (**self).compile(permutation, arguments)
    }

    fn extract_reflection(&self, binary: &[u8]) -> Result<Option<ReflectionData>, BackendFailure> {
        (**self).extract_reflection(binary)
    }
}

//! Permutator Backends - external shader compilers
//!
//! Each backend runs its compiler as a child process per permutation:
//! - [`DxcBackend`]: HLSL to DXIL or SPIR-V
//! - [`FxcBackend`]: HLSL to DXBC
//! - [`GlslangBackend`]: GLSL/HLSL to SPIR-V
//!
//! SPIR-V output is reflected with naga.

pub mod dxc;
pub mod error;
pub mod fxc;
pub mod glslang;
pub mod process;
pub mod reflect;

use std::path::PathBuf;

pub use dxc::DxcBackend;
pub use error::BackendError;
pub use fxc::FxcBackend;
pub use glslang::GlslangBackend;

/// How to invoke a compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Compiler executable; `None` uses the backend's default name on PATH
    pub executable: Option<PathBuf>,
    /// Shader profile (`ps_6_0`) or stage (`frag`)
    pub target: String,
    pub entry_point: String,
}

impl ToolConfig {
    pub fn new(target: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            executable: None,
            target: target.into(),
            entry_point: entry_point.into(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub(crate) fn executable_or(&self, default: &str) -> PathBuf {
        self.executable
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executable_override() {
        let config = ToolConfig::new("ps_6_0", "main");
        assert_eq!(config.executable_or("dxc"), PathBuf::from("dxc"));
        let config = config.with_executable("/opt/dxc/bin/dxc");
        assert_eq!(config.executable_or("dxc"), PathBuf::from("/opt/dxc/bin/dxc"));
    }
}

//! Legacy Direct3D compiler (`fxc`). DXBC output, no reflection.

use permutator_core::{
    BackendFailure, CompileFailure, CompiledBinary, CompilerArguments, CompilerBackend,
    Permutation,
};

use crate::ToolConfig;
use crate::process::{Invocation, Scratch, finish};

pub const DEFAULT_EXECUTABLE: &str = "fxc";

#[derive(Debug, Clone)]
pub struct FxcBackend {
    config: ToolConfig,
}

impl FxcBackend {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn invocation(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Invocation {
        let mut invocation = Invocation::new(self.config.executable_or(DEFAULT_EXECUTABLE));
        invocation
            .arg("/nologo")
            .args(["/T", self.config.target.as_str()])
            .args(["/E", self.config.entry_point.as_str()]);
        for define in arguments.defines.iter().chain(&permutation.option_defines) {
            invocation.arg("/D").arg(define.to_string());
        }
        for path in &arguments.include_paths {
            invocation.arg("/I").arg(path);
        }
        invocation.args(&arguments.extra).arg(&permutation.source_path);
        invocation
    }
}

impl CompilerBackend for FxcBackend {
    fn name(&self) -> &str {
        "fxc"
    }

    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure> {
        let scratch = Scratch::new().map_err(BackendFailure::from)?;
        let mut invocation = self.invocation(permutation, arguments);
        invocation.scratch_arg("/Fo").scratch_arg(scratch.output_path());
        let output = invocation.run().map_err(BackendFailure::from)?;
        finish(self.name(), &invocation, output, &scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permutator_core::Define;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    #[test]
    fn test_command_line_uses_slash_flags() {
        let backend = FxcBackend::new(ToolConfig::new("ps_5_0", "main"));
        let permutation = Permutation {
            key: 0,
            option_defines: vec![Define::new("DEBUG", "0")],
            source_path: PathBuf::from("a.hlsl"),
            dependencies: BTreeSet::new(),
            identical_to: None,
        };
        let line = backend
            .invocation(&permutation, &CompilerArguments::default())
            .command_line();
        assert_eq!(
            line,
            vec!["fxc", "/nologo", "/T", "ps_5_0", "/E", "main", "/D", "DEBUG=0", "a.hlsl"]
        );
    }

    #[test]
    fn test_no_reflection() {
        let backend = FxcBackend::new(ToolConfig::new("ps_5_0", "main"));
        assert_eq!(backend.extract_reflection(&[0u8; 8]).unwrap(), None);
    }
}

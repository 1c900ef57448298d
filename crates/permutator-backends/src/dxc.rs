//! DirectX Shader Compiler (`dxc`)
//!
//! Produces DXIL, or SPIR-V when `-spirv` is among the extra arguments. Only
//! SPIR-V output can be reflected.

use permutator_core::{
    BackendFailure, CompileFailure, CompiledBinary, CompilerArguments, CompilerBackend,
    Permutation, ReflectionData,
};

use crate::ToolConfig;
use crate::process::{Invocation, Scratch, finish};
use crate::reflect;

pub const DEFAULT_EXECUTABLE: &str = "dxc";

#[derive(Debug, Clone)]
pub struct DxcBackend {
    config: ToolConfig,
}

impl DxcBackend {
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
            .args(["-T", self.config.target.as_str()])
            .args(["-E", self.config.entry_point.as_str()]);
        for define in arguments.defines.iter().chain(&permutation.option_defines) {
            invocation.arg("-D").arg(define.to_string());
        }
        for path in &arguments.include_paths {
            invocation.arg("-I").arg(path);
        }
        invocation.args(&arguments.extra).arg(&permutation.source_path);
        invocation
    }
}

impl CompilerBackend for DxcBackend {
    fn name(&self) -> &str {
        "dxc"
    }

    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure> {
        let scratch = Scratch::new().map_err(BackendFailure::from)?;
        let mut invocation = self.invocation(permutation, arguments);
        invocation.scratch_arg("-Fo").scratch_arg(scratch.output_path());
        let output = invocation.run().map_err(BackendFailure::from)?;
        finish(self.name(), &invocation, output, &scratch)
    }

    fn extract_reflection(&self, binary: &[u8]) -> Result<Option<ReflectionData>, BackendFailure> {
        if !reflect::is_spirv(binary) {
            return Ok(None);
        }
        Ok(Some(reflect::reflect_spirv(binary)?))
    }
}

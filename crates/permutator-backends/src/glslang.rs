//! Khronos reference compiler (`glslangValidator`), SPIR-V output
//!
//! The configured target is the shader stage (`vert`, `frag`, `comp`, ...).
//! Include dependencies come back through `--depfile`.

use permutator_core::{
    BackendFailure, CompileFailure, CompiledBinary, CompilerArguments, CompilerBackend,
    Permutation, ReflectionData,
};

use crate::ToolConfig;
use crate::process::{Invocation, Scratch, finish};
use crate::reflect;

pub const DEFAULT_EXECUTABLE: &str = "glslangValidator";

const DEFAULT_ENTRY_POINT: &str = "main";

#[derive(Debug, Clone)]
pub struct GlslangBackend {
    config: ToolConfig,
}

impl GlslangBackend {
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
            .arg("-V")
            .args(["-S", self.config.target.as_str()]);
        if self.config.entry_point != DEFAULT_ENTRY_POINT {
            invocation
                .args(["-e", self.config.entry_point.as_str()])
                .args(["--source-entrypoint", self.config.entry_point.as_str()]);
        }
        for define in arguments.defines.iter().chain(&permutation.option_defines) {
            invocation.arg(format!("-D{define}"));
        }
        for path in &arguments.include_paths {
            let mut flag = std::ffi::OsString::from("-I");
            flag.push(path);
            invocation.arg(flag);
        }
        invocation.args(&arguments.extra).arg(&permutation.source_path);
        invocation
    }
}

impl CompilerBackend for GlslangBackend {
    fn name(&self) -> &str {
        "glslang"
    }

    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure> {
        let scratch = Scratch::new().map_err(BackendFailure::from)?;
        let mut invocation = self.invocation(permutation, arguments);
        invocation
            .scratch_arg("--depfile")
            .scratch_arg(scratch.depfile_path())
            .scratch_arg("-o")
            .scratch_arg(scratch.output_path());
        let output = invocation.run().map_err(BackendFailure::from)?;
        finish(self.name(), &invocation, output, &scratch)
    }

    fn extract_reflection(&self, binary: &[u8]) -> Result<Option<ReflectionData>, BackendFailure> {
        Ok(Some(reflect::reflect_spirv(binary)?))
    }
}

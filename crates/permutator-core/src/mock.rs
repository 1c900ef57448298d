//! Mock compiler backend for testing
//!
//! Produces binaries from the permutation's defines instead of running a
//! compiler, and records every compile so tests can assert on what the
//! scheduler actually sent to the backend.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use crate::backend::{BackendFailure, CompileFailure, CompiledBinary, CompilerArguments, CompilerBackend};
use crate::generator::Permutation;
use crate::option::describe_defines;
use crate::reflection::ReflectionData;

type OutputFn = Box<dyn Fn(&Permutation) -> Vec<u8> + Send + Sync>;

/// Record of a compile call for test inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCall {
    pub key: u32,
    /// Option defines as `A=1;B`
    pub defines: String,
}

/// A backend that compiles nothing and remembers everything
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<CompileCall>>,
    output: Option<OutputFn>,
    fail_on: Option<(String, String)>,
    reflection: Option<ReflectionData>,
    warnings: Vec<String>,
    dependencies: Vec<PathBuf>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the default output (the defines string) with `output`
    pub fn with_output(
        mut self,
        output: impl Fn(&Permutation) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        self.output = Some(Box::new(output));
        self
    }

    /// Every permutation produces the same bytes
    pub fn with_identical_output(self, bytes: &[u8]) -> Self {
        let bytes = bytes.to_vec();
        self.with_output(move |_| bytes.clone())
    }

    /// Reject any permutation that defines `name=value`
    pub fn fail_when(mut self, name: &str, value: &str) -> Self {
        self.fail_on = Some((name.to_string(), value.to_string()));
        self
    }

    pub fn with_reflection(mut self, reflection: ReflectionData) -> Self {
        self.reflection = Some(reflection);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Extra dependency reported for every compile
    pub fn with_dependency(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependencies.push(path.into());
        self
    }

    pub fn calls(&self) -> Vec<CompileCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn compile_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a permutation with this key reached the backend
    pub fn compiled_key(&self, key: u32) -> bool {
        self.calls().iter().any(|call| call.key == key)
    }
}

impl CompilerBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn compile(
        &self,
        permutation: &Permutation,
        arguments: &CompilerArguments,
    ) -> Result<CompiledBinary, CompileFailure> {
        let defines = describe_defines(&permutation.option_defines);
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CompileCall {
                key: permutation.key,
                defines: defines.clone(),
            });

        if let Some((name, value)) = &self.fail_on {
            let rejected = permutation
                .option_defines
                .iter()
                .any(|d| d.name == *name && d.value.as_deref() == Some(value.as_str()));
            if rejected {
                return Err(CompileFailure::Diagnostics(format!(
                    "mock: rejected permutation [{defines}]"
                )));
            }
        }

        let binary = match &self.output {
            Some(output) => output(permutation),
            None => defines.into_bytes(),
        };

        let mut command = vec!["mock".to_string()];
        command.extend(
            arguments
                .defines
                .iter()
                .chain(&permutation.option_defines)
                .map(|d| format!("-D{d}")),
        );
        command.extend(arguments.extra.iter().cloned());

        Ok(CompiledBinary {
            binary,
            warnings: self.warnings.clone(),
            arguments: command,
            dependencies: self.dependencies.clone(),
        })
    }

    fn extract_reflection(&self, _binary: &[u8]) -> Result<Option<ReflectionData>, BackendFailure> {
        Ok(self.reflection.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::Define;
    use std::collections::BTreeSet;

    fn permutation(key: u32, defines: Vec<Define>) -> Permutation {
        Permutation {
            key,
            option_defines: defines,
            source_path: PathBuf::from("a.hlsl"),
            dependencies: BTreeSet::new(),
            identical_to: None,
        }
    }

    #[test]
    fn test_records_calls() {
        let mock = MockBackend::new();
        let args = CompilerArguments::default();
        mock.compile(&permutation(3, vec![Define::new("A", "1")]), &args)
            .unwrap();

        assert_eq!(mock.compile_count(), 1);
        assert!(mock.compiled_key(3));
        assert_eq!(mock.calls()[0].defines, "A=1");
    }

    #[test]
    fn test_default_output_differs_per_permutation() {
        let mock = MockBackend::new();
        let args = CompilerArguments::default();
        let a = mock.compile(&permutation(0, vec![Define::new("A", "0")]), &args).unwrap();
        let b = mock.compile(&permutation(1, vec![Define::new("A", "1")]), &args).unwrap();
        assert_ne!(a.binary, b.binary);
    }

    #[test]
    fn test_arguments_include_constant_defines() {
        let mock = MockBackend::new();
        let args = CompilerArguments {
            defines: vec![Define::flag("PLATFORM_PC")],
            extra: vec!["-O3".to_string()],
            ..Default::default()
        };
        let out = mock.compile(&permutation(0, vec![Define::new("A", "1")]), &args).unwrap();
        assert_eq!(out.arguments, vec!["mock", "-DPLATFORM_PC", "-DA=1", "-O3"]);
    }

    #[test]
    fn test_fail_when() {
        let mock = MockBackend::new().fail_when("A", "1");
        let args = CompilerArguments::default();
        assert!(mock.compile(&permutation(0, vec![Define::new("A", "0")]), &args).is_ok());
        let err = mock
            .compile(&permutation(1, vec![Define::new("A", "1")]), &args)
            .unwrap_err();
        assert!(matches!(err, CompileFailure::Diagnostics(_)));
    }
}

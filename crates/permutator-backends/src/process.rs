//! Running an external compiler for one permutation
//!
//! Every compile gets its own scratch directory for the output binary and
//! any dep file, so concurrent compiles never share a path. Scratch paths are
//! kept out of the recorded command line; they differ on every run and would
//! defeat `-embed-arguments`.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use permutator_core::{BackendFailure, CompileFailure, CompiledBinary};
use tempfile::TempDir;

use crate::error::BackendError;

/// A command line under construction
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    scratch_args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            scratch_args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// An argument naming a scratch file; passed to the tool, never recorded
    pub fn scratch_arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.scratch_args.push(arg.as_ref().to_os_string());
        self
    }

    /// Program and arguments as they should be reported
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    pub fn run(&self) -> Result<ToolOutput, BackendError> {
        log::trace!("Running {}", self.command_line().join(" "));
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(&self.scratch_args)
            .output()
            .map_err(|source| BackendError::Spawn {
                tool: self.program.display().to_string(),
                source,
            })?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Captured result of a tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Everything the tool printed, for failed compiles. Some tools report
    /// errors on stdout.
    pub fn diagnostics(&self) -> String {
        let text: Vec<&str> = [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if text.is_empty() {
            "compiler exited with an error and printed nothing".to_string()
        } else {
            text.join("\n")
        }
    }

    /// Non-fatal output of a successful compile
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            warnings.push(stderr.to_string());
        }
        warnings.extend(
            self.stdout
                .lines()
                .filter(|line| line.trim_start().starts_with("WARNING:"))
                .map(|line| line.trim().to_string()),
        );
        warnings
    }
}

/// Per-compile scratch directory, removed on drop
pub struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub fn new() -> Result<Self, BackendError> {
        tempfile::Builder::new()
            .prefix("permutator-")
            .tempdir()
            .map(|dir| Self { dir })
            .map_err(BackendError::Scratch)
    }

    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join("output.bin")
    }

    pub fn depfile_path(&self) -> PathBuf {
        self.dir.path().join("output.d")
    }
}

/// Turn a finished tool run into the backend result
pub fn finish(
    tool: &str,
    invocation: &Invocation,
    output: ToolOutput,
    scratch: &Scratch,
) -> Result<CompiledBinary, CompileFailure> {
    if !output.success {
        return Err(CompileFailure::Diagnostics(output.diagnostics()));
    }

    let path = scratch.output_path();
    let binary = match fs::read(&path) {
        Ok(binary) if !binary.is_empty() => binary,
        _ => {
            let error = BackendError::MissingOutput {
                tool: tool.to_string(),
                path,
            };
            return Err(BackendFailure::from(error).into());
        }
    };

    let dependencies = match fs::read_to_string(scratch.depfile_path()) {
        Ok(text) => parse_gcc_depfile(&text),
        Err(_) => Vec::new(),
    };

    Ok(CompiledBinary {
        binary,
        warnings: output.warnings(),
        arguments: invocation.command_line(),
        dependencies,
    })
}

/// Prerequisites of a make-style dep file
pub fn parse_gcc_depfile(text: &str) -> Vec<PathBuf> {
    let joined = text.replace("\\\r\n", " ").replace("\\\n", " ");
    let mut dependencies = Vec::new();

    for rule in joined.lines() {
        let Some(prerequisites) = split_target(rule) else {
            continue;
        };
        let mut current = String::new();
        let mut chars = prerequisites.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if matches!(chars.peek(), Some(' ') | Some('#')) => {
                    current.extend(chars.next());
                }
                '$' if chars.peek() == Some(&'$') => {
                    chars.next();
                    current.push('$');
                }
                c if c.is_whitespace() => {
                    if !current.is_empty() {
                        dependencies.push(PathBuf::from(std::mem::take(&mut current)));
                    }
                }
                c => current.push(c),
            }
        }
        if !current.is_empty() {
            dependencies.push(PathBuf::from(current));
        }
    }
    dependencies
}

/// Text after the rule's `target:`. A colon followed by a path separator
/// is a drive letter, not the rule separator.
fn split_target(rule: &str) -> Option<&str> {
    let bytes = rule.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|&(i, &b)| {
            b == b':' && !matches!(bytes.get(i + 1), Some(b'/') | Some(b'\\'))
        })
        .map(|(i, _)| &rule[i + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_excludes_scratch() {
        let mut invocation = Invocation::new("dxc");
        invocation
            .args(["-T", "ps_6_0"])
            .scratch_arg("-Fo")
            .scratch_arg("/tmp/x/output.bin")
            .arg("shader.hlsl");
        assert_eq!(
            invocation.command_line(),
            vec!["dxc", "-T", "ps_6_0", "shader.hlsl"]
        );
    }

    #[test]
    fn test_missing_executable_is_infrastructure_failure() {
        let invocation = Invocation::new("permutator-no-such-compiler");
        let err = invocation.run().unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[test]
    fn test_failed_run_reports_diagnostics() {
        let scratch = Scratch::new().unwrap();
        let output = ToolOutput {
            success: false,
            stdout: "ERROR: 0:3: 'x' : undeclared identifier\n".to_string(),
            stderr: String::new(),
        };
        let err = finish("glslang", &Invocation::new("glslang"), output, &scratch).unwrap_err();
        match err {
            CompileFailure::Diagnostics(text) => assert!(text.contains("undeclared")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_success_without_output_is_infrastructure_failure() {
        let scratch = Scratch::new().unwrap();
        let output = ToolOutput {
            success: true,
            ..Default::default()
        };
        let err = finish("dxc", &Invocation::new("dxc"), output, &scratch).unwrap_err();
        assert!(matches!(err, CompileFailure::Infrastructure(_)));
    }

    #[test]
    fn test_success_collects_binary_warnings_and_deps() {
        let scratch = Scratch::new().unwrap();
        fs::write(scratch.output_path(), [1u8, 2, 3]).unwrap();
        fs::write(
            scratch.depfile_path(),
            "output.bin: a.frag \\\n  inc/common.glsl\n",
        )
        .unwrap();
        let output = ToolOutput {
            success: true,
            stdout: "a.frag\nWARNING: 0:1: unused\n".to_string(),
            stderr: String::new(),
        };
        let compiled = finish("glslang", &Invocation::new("glslang"), output, &scratch).unwrap();

        assert_eq!(compiled.binary, vec![1, 2, 3]);
        assert_eq!(compiled.warnings, vec!["WARNING: 0:1: unused"]);
        assert_eq!(compiled.arguments, vec!["glslang"]);
        assert_eq!(compiled.dependencies.len(), 2);
        assert_eq!(compiled.dependencies[1], PathBuf::from("inc/common.glsl"));
    }

    #[test]
    fn test_depfile_escapes_and_drive_letters() {
        let deps = parse_gcc_depfile("C:/out/x.spv: C:/src/my\\ shader.hlsl a$$b.h c\\#1.h\n");
        assert_eq!(
            deps,
            vec![
                PathBuf::from("C:/src/my shader.hlsl"),
                PathBuf::from("a$b.h"),
                PathBuf::from("c#1.h"),
            ]
        );
    }

    #[test]
    fn test_depfile_without_rule() {
        assert!(parse_gcc_depfile("").is_empty());
        assert!(parse_gcc_depfile("no rule here\n").is_empty());
    }
}

//! Common test utilities and harness
//!
//! Provides reusable utilities for functional testing including:
//! - Test environment setup (temp directory with shader sources)
//! - Running the command line front end against a mock backend
//! - Readers for the generated headers

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use permutator::{Args, app, cli};
use permutator_config::Config;
use permutator_core::mock::MockBackend;
use permutator_core::{Job, Report, Result, run_job};
use tempfile::TempDir;

/// Test environment with an isolated source and output tree
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let output_dir = temp_dir.path().join("out");
        Self {
            temp_dir,
            output_dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a source file relative to the environment root
    pub fn write_source(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create source directory");
        }
        fs::write(&path, content).expect("Failed to write test source");
        path
    }

    /// Write `permutator.toml` and return its path
    pub fn write_config(&self, content: &str) -> PathBuf {
        self.write_source("permutator.toml", content)
    }

    /// Parse a command line whose last argument is the shader source, with
    /// `-output=` pointing into this environment
    pub fn args(&self, flags: &[&str], source: &Path) -> Args {
        let mut line: Vec<String> = flags.iter().map(|s| s.to_string()).collect();
        line.push(format!("-output={}", self.output_dir.display()));
        line.push(source.display().to_string());
        cli::parse(line).expect("command line should parse")
    }

    pub fn job(&self, args: &Args, config: &Config) -> Job {
        app::build_job(args, config).expect("job should build")
    }

    /// Parse, merge with `config` and run against `backend`
    pub fn run(
        &self,
        flags: &[&str],
        source: &Path,
        config: &Config,
        backend: &MockBackend,
    ) -> Result<Report> {
        let args = self.args(flags, source);
        let job = app::build_job(&args, config)?;
        run_job(&job, backend)
    }

    pub fn output(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn read_output(&self, name: &str) -> String {
        fs::read_to_string(self.output(name)).expect("Failed to read generated file")
    }

    /// Names of every file in the output directory, sorted
    pub fn output_files(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.output_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries of `g_<shader>_IndirectionTable` in a generated aggregate header
pub fn indirection_table(header: &str, shader: &str) -> Vec<usize> {
    let start = format!("static const uint32_t g_{shader}_IndirectionTable[] = {{");
    header
        .lines()
        .skip_while(|line| *line != start)
        .skip(1)
        .take_while(|line| *line != "};")
        .map(|line| {
            line.trim()
                .trim_end_matches(',')
                .parse()
                .expect("indirection entry should be a number")
        })
        .collect()
}

/// Rows of `g_<shader>_PermutationInfo` in a generated aggregate header
pub fn permutation_info_rows(header: &str, shader: &str) -> Vec<String> {
    let start = format!("static const {shader}_PermutationInfo g_{shader}_PermutationInfo[] = {{");
    header
        .lines()
        .skip_while(|line| *line != start)
        .skip(1)
        .take_while(|line| *line != "};")
        .map(|line| line.trim().to_string())
        .collect()
}

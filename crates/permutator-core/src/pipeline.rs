//! One end-to-end build: scan, generate, compile, emit

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::{CompilerArguments, CompilerBackend};
use crate::depfile::{DepFileFormat, write_dependency_file};
use crate::emit::{EmitOptions, HeaderEmitter};
use crate::error::{Error, Result};
use crate::generator::generate_permutations;
use crate::option::OptionSet;
use crate::scanner::UsageScanner;
use crate::scheduler::{RunStats, Scheduler, SchedulerOptions};

/// Everything needed to build the permutations of one shader
#[derive(Debug, Clone)]
pub struct Job {
    pub source_path: PathBuf,
    /// Prefix of every generated identifier and file name
    pub shader_name: String,
    pub output_dir: PathBuf,
    pub options: OptionSet,
    pub arguments: CompilerArguments,
    pub threads: usize,
    pub reflection: bool,
    pub embed_arguments: bool,
    pub print_arguments: bool,
    pub deps: Option<DepFileFormat>,
}

impl Job {
    /// A job with the shader name taken from the source file stem
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: OptionSet,
    ) -> Self {
        let source_path = source_path.into();
        Self {
            shader_name: default_shader_name(&source_path),
            source_path,
            output_dir: output_dir.into(),
            options,
            arguments: CompilerArguments::default(),
            threads: 0,
            reflection: false,
            embed_arguments: false,
            print_arguments: false,
            deps: None,
        }
    }
}

pub fn default_shader_name(source_path: &Path) -> String {
    source_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Shader".to_string())
}

/// What a successful build produced
#[derive(Debug, Clone)]
pub struct Report {
    pub permutations_header: PathBuf,
    pub dependency_file: Option<PathBuf>,
    /// Include closure plus compiler-reported dependencies
    pub dependencies: BTreeSet<PathBuf>,
    /// Options whose names never occur in the shader text
    pub unused_options: Vec<String>,
    pub stats: RunStats,
}

/// Build every permutation of `job`. On failure the aggregate header is
/// removed so a stale one cannot outlive a broken build.
pub fn run_job(job: &Job, backend: &dyn CompilerBackend) -> Result<Report> {
    if let Some(format) = job.deps {
        format.ensure_supported()?;
    }
    if !job.source_path.is_file() {
        return Err(Error::Argument(format!(
            "shader source {:?} does not exist",
            job.source_path
        )));
    }
    fs::create_dir_all(&job.output_dir).map_err(|e| Error::io(&job.output_dir, e))?;

    let emitter = HeaderEmitter::new(
        &job.output_dir,
        &job.shader_name,
        EmitOptions {
            reflection: job.reflection,
            embed_arguments: job.embed_arguments,
        },
    );

    let result = build(job, backend, &emitter);
    if let Err(error) = &result {
        if let Err(e) = emitter.remove_permutations_header() {
            log::warn!("{} (after: {})", e, error);
        }
    }
    result
}

fn build(job: &Job, backend: &dyn CompilerBackend, emitter: &HeaderEmitter) -> Result<Report> {
    let scanner = UsageScanner::new(job.arguments.include_paths.clone());
    let mut options = job.options.clone();
    scanner.scan(&job.source_path, &mut options)?;
    let closure = scanner.include_closure(&job.source_path)?;

    let unused_options: Vec<String> = options
        .unused_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    if !unused_options.is_empty() {
        log::info!("Options not referenced by the shader: {}", unused_options.join(", "));
    }

    let permutations = generate_permutations(&options, &job.source_path, &closure);
    log::info!(
        "{:?}: {} option(s), {} key bit(s), {} permutation(s)",
        job.source_path,
        options.len(),
        options.total_bits(),
        permutations.len()
    );

    let scheduler = Scheduler::new(SchedulerOptions {
        threads: job.threads,
        reflection: job.reflection,
        print_arguments: job.print_arguments,
    });
    let outcome = scheduler.process(permutations, backend, &job.arguments, emitter)?;

    let permutations_header = emitter.write_permutations_header(&options, &outcome.table)?;

    let mut dependencies = closure;
    dependencies.extend(outcome.table.dependencies());
    let dependency_file = match job.deps {
        Some(format) => Some(write_dependency_file(
            &permutations_header,
            &dependencies,
            format,
        )?),
        None => None,
    };

    let stats = outcome.stats;
    log::info!(
        "{}: {} generated, {} compiled, {} unique in {:.2?}",
        emitter.shader_name(),
        stats.generated,
        stats.compiled,
        stats.unique,
        stats.elapsed
    );

    Ok(Report {
        permutations_header,
        dependency_file,
        dependencies,
        unused_options,
        stats,
    })
}

//! Wiring between the command line, the configuration file and the build

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use permutator_backends::{DxcBackend, FxcBackend, GlslangBackend, ToolConfig};
use permutator_config::{CompilerKind, Config, DepsFormat, SourceWatcher};
use permutator_core::{
    CompilerArguments, CompilerBackend, Declaration, DepFileFormat, Error, Job, OptionSet,
    UsageScanner, run_job,
};

use crate::cli::Args;

/// Merge command line and configuration into a build job. Command line
/// values win; list values are concatenated, configuration first.
pub fn build_job(args: &Args, config: &Config) -> permutator_core::Result<Job> {
    let mut arguments = CompilerArguments::default();
    let mut options = Vec::new();

    for text in &config.build.defines {
        match Declaration::parse(text)? {
            Declaration::Constant(define) => arguments.defines.push(define),
            Declaration::Option(option) => {
                return Err(Error::Argument(format!(
                    "configured define '{}' declares options; use -D on the command line",
                    option.name
                )));
            }
        }
    }
    for declaration in &args.declarations {
        match declaration {
            Declaration::Constant(define) => arguments.defines.push(define.clone()),
            Declaration::Option(option) => options.push(option.clone()),
        }
    }

    arguments.include_paths = config
        .build
        .include_paths
        .iter()
        .chain(&args.include_paths)
        .cloned()
        .collect();
    arguments.extra = config
        .compiler
        .args
        .iter()
        .chain(&args.forwarded)
        .cloned()
        .collect();

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.directory.clone());
    let mut job = Job::new(&args.source, output_dir, OptionSet::new(options)?);
    if let Some(name) = &args.name {
        job.shader_name = name.clone();
    }
    job.arguments = arguments;
    job.threads = args.threads.unwrap_or(config.build.threads);
    job.reflection = args.reflection || config.output.reflection;
    job.embed_arguments = args.embed_arguments || config.output.embed_arguments;
    job.print_arguments = args.print_arguments || config.output.print_arguments;
    job.deps = match args.deps.unwrap_or(config.output.deps) {
        DepsFormat::None => None,
        DepsFormat::Gcc => Some(DepFileFormat::Gcc),
        DepsFormat::Msvc => Some(DepFileFormat::Msvc),
    };
    Ok(job)
}

/// The compiler selected by command line or configuration
pub fn create_backend(args: &Args, config: &Config) -> Box<dyn CompilerBackend> {
    let kind = args.compiler.unwrap_or(config.compiler.kind);
    let target = args
        .target
        .clone()
        .or_else(|| config.compiler.target.clone())
        .unwrap_or_else(|| kind.default_target().to_string());
    let entry_point = args
        .entry_point
        .clone()
        .unwrap_or_else(|| config.compiler.entry_point.clone());

    let mut tool = ToolConfig::new(target, entry_point);
    if let Some(executable) = args.executable.as_ref().or(config.compiler.executable.as_ref()) {
        tool = tool.with_executable(executable);
    }
    log::debug!("Using {} with {:?}", kind.name(), tool);

    match kind {
        CompilerKind::Dxc => Box::new(DxcBackend::new(tool)),
        CompilerKind::Fxc => Box::new(FxcBackend::new(tool)),
        CompilerKind::Glslang => Box::new(GlslangBackend::new(tool)),
    }
}

pub fn run(args: &Args) -> anyhow::Result<()> {
    let config = Config::load(args.config.as_deref()).context("loading configuration")?;
    let job = build_job(args, &config)?;
    let backend = create_backend(args, &config);

    if args.watch {
        return watch(&job, backend.as_ref());
    }

    let report = run_job(&job, backend.as_ref())
        .with_context(|| format!("building {}", job.source_path.display()))?;
    log::info!("Wrote {}", report.permutations_header.display());
    Ok(())
}

/// Build, then rebuild every time the shader or one of its includes changes.
/// Build failures are reported and waited out.
fn watch(job: &Job, backend: &dyn CompilerBackend) -> anyhow::Result<()> {
    let mut files = source_closure(job);
    loop {
        let (watcher, next) = watched_build(job, backend, &files)?;

        let pending = watcher.drain();
        if !pending.is_empty() {
            for path in &pending {
                log::info!("{} changed during the build, rebuilding", path.display());
            }
            files = next;
            continue;
        }

        let watcher = if next == files {
            watcher
        } else {
            SourceWatcher::new(next.clone()).context("watching shader sources")?
        };
        files = next;

        let Some(changed) = watcher.wait() else {
            return Ok(());
        };
        for path in &changed {
            log::info!("{} changed, rebuilding", path.display());
        }
    }
}

/// Run one build with `files` already watched, so saves made while it
/// compiles are reported by the returned watcher. Also returns the files the
/// next build should watch.
pub fn watched_build(
    job: &Job,
    backend: &dyn CompilerBackend,
    files: &BTreeSet<PathBuf>,
) -> anyhow::Result<(SourceWatcher, BTreeSet<PathBuf>)> {
    let watcher = SourceWatcher::new(files.iter().cloned()).context("watching shader sources")?;
    let next = match run_job(job, backend) {
        Ok(report) => report.dependencies,
        Err(e) => {
            log::error!("{}", e);
            source_closure(job)
        }
    };
    Ok((watcher, next))
}

fn source_closure(job: &Job) -> BTreeSet<PathBuf> {
    UsageScanner::new(job.arguments.include_paths.clone())
        .include_closure(&job.source_path)
        .unwrap_or_else(|_| BTreeSet::from([job.source_path.clone()]))
}

//! Multi-threaded compilation of generated permutations
//!
//! Workers drain a shared LIFO queue. Speculative duplicates never reach the
//! backend: if their representative already resolved they alias its index,
//! otherwise they are parked in the deduplication table and resolved by the
//! representative's worker when it records its own result. Compilation runs
//! with no lock held; the queue and the table each have their own mutex and
//! are only held for bookkeeping.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::backend::{CompileFailure, CompilerArguments, CompilerBackend};
use crate::dedup::{CompiledPermutation, DeduplicationTable, Resolution, content_digest};
use crate::emit::HeaderEmitter;
use crate::error::{Error, Result};
use crate::generator::{Permutation, count_speculative};
use crate::option::describe_defines;
use crate::reflection::ReflectionData;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Worker count; 0 uses the hardware concurrency
    pub threads: usize,
    pub reflection: bool,
    /// Print each compiler command line to stdout
    pub print_arguments: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub generated: usize,
    pub speculative_duplicates: usize,
    pub compiled: usize,
    /// Compiled permutations whose binary matched an earlier one
    pub content_duplicates: usize,
    pub unique: usize,
    pub threads: usize,
    pub elapsed: Duration,
}

/// Final state of a successful run
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub table: DeduplicationTable,
    pub stats: RunStats,
}

/// Workers worth spawning: never more than there is real compile work
pub fn thread_count(requested: usize, generated: usize, speculative: usize) -> usize {
    let wanted = if requested == 0 {
        thread::available_parallelism().map_or(1, |n| n.get())
    } else {
        requested
    };
    wanted.min(generated.saturating_sub(speculative)).max(1)
}

pub struct Scheduler {
    options: SchedulerOptions,
}

impl Scheduler {
    pub fn new(options: SchedulerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Compile every permutation exactly once, on the calling thread plus
    /// a pool of workers
    pub fn process(
        &self,
        permutations: Vec<Permutation>,
        backend: &dyn CompilerBackend,
        arguments: &CompilerArguments,
        emitter: &HeaderEmitter,
    ) -> Result<ScheduleOutcome> {
        let generated = permutations.len();
        let speculative = count_speculative(&permutations);
        let threads = thread_count(self.options.threads, generated, speculative);
        log::info!(
            "Compiling {} permutation(s) with {}: {} predicted duplicate(s), {} thread(s)",
            generated,
            backend.name(),
            speculative,
            threads
        );
        CompilerContext::new(backend, arguments, emitter, &self.options, permutations).run(threads)
    }
}

/// Everything the workers share for one run
pub struct CompilerContext<'a> {
    backend: &'a dyn CompilerBackend,
    arguments: &'a CompilerArguments,
    emitter: &'a HeaderEmitter,
    options: &'a SchedulerOptions,
    generated: usize,
    speculative: usize,
    queue: Mutex<VecDeque<Permutation>>,
    table: Mutex<DeduplicationTable>,
    abort: AtomicBool,
    failure: Mutex<Option<Error>>,
    compiled: AtomicUsize,
    reflection_unavailable: AtomicBool,
}

impl<'a> CompilerContext<'a> {
    pub fn new(
        backend: &'a dyn CompilerBackend,
        arguments: &'a CompilerArguments,
        emitter: &'a HeaderEmitter,
        options: &'a SchedulerOptions,
        permutations: Vec<Permutation>,
    ) -> Self {
        Self {
            backend,
            arguments,
            emitter,
            options,
            generated: permutations.len(),
            speculative: count_speculative(&permutations),
            queue: Mutex::new(permutations.into()),
            table: Mutex::new(DeduplicationTable::new()),
            abort: AtomicBool::new(false),
            failure: Mutex::new(None),
            compiled: AtomicUsize::new(0),
            reflection_unavailable: AtomicBool::new(false),
        }
    }

    /// Run `threads` workers to completion, the calling thread included
    pub fn run(self, threads: usize) -> Result<ScheduleOutcome> {
        let start = Instant::now();
        let threads = threads.max(1);

        thread::scope(|scope| {
            for index in 1..threads {
                let context = &self;
                let spawned = thread::Builder::new()
                    .name(format!("permutator-worker-{index}"))
                    .spawn_scoped(scope, move || context.worker());
                if let Err(e) = spawned {
                    log::warn!("Could not spawn worker {}: {}", index, e);
                    break;
                }
            }
            self.worker();
        });

        if let Some(error) = self
            .failure
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            return Err(error);
        }

        let table = self.table.into_inner().unwrap_or_else(PoisonError::into_inner);
        let parked = table.parked_keys();
        if !parked.is_empty() {
            return Err(Error::Internal(format!(
                "{} speculative duplicate(s) never resolved: {:?}",
                parked.len(),
                parked
            )));
        }
        if table.resolved_count() != self.generated {
            return Err(Error::Internal(format!(
                "resolved {} of {} permutation(s)",
                table.resolved_count(),
                self.generated
            )));
        }

        let compiled = self.compiled.into_inner();
        let stats = RunStats {
            generated: self.generated,
            speculative_duplicates: self.speculative,
            compiled,
            content_duplicates: compiled - table.unique_count(),
            unique: table.unique_count(),
            threads,
            elapsed: start.elapsed(),
        };
        Ok(ScheduleOutcome { table, stats })
    }

    fn worker(&self) {
        while !self.abort.load(Ordering::Acquire) {
            let Some(permutation) = lock(&self.queue).pop_back() else {
                break;
            };

            if let Some(representative) = permutation.identical_to {
                let resolution =
                    lock(&self.table).resolve_speculative(permutation.key, representative);
                if resolution == Resolution::Parked {
                    log::trace!(
                        "Key {:#x} parked on representative {:#x}",
                        permutation.key,
                        representative
                    );
                }
                continue;
            }

            if let Err(error) = self.compile(permutation) {
                self.fail(error);
                break;
            }
        }
    }

    fn compile(&self, permutation: Permutation) -> Result<()> {
        let key = permutation.key;
        let defines = describe_defines(&permutation.option_defines);
        log::debug!("Compiling {:?} [{}]", permutation.source_path, defines);

        let output = self
            .backend
            .compile(&permutation, self.arguments)
            .map_err(|failure| match failure {
                CompileFailure::Diagnostics(diagnostics) => Error::Compile {
                    path: permutation.source_path.clone(),
                    key,
                    defines: defines.clone(),
                    diagnostics,
                },
                CompileFailure::Infrastructure(failure) => Error::Backend {
                    backend: self.backend.name().to_string(),
                    message: failure.message,
                },
            })?;
        self.compiled.fetch_add(1, Ordering::Relaxed);

        for warning in &output.warnings {
            log::warn!("{} [{}]: {}", permutation.source_path.display(), defines, warning);
        }
        if self.options.print_arguments {
            println!("{}", output.arguments.join(" "));
        }

        let reflection = if self.options.reflection {
            self.reflect(&output.binary)?
        } else {
            None
        };

        let content_hash = content_digest(&output.binary);
        let mut dependencies = permutation.dependencies;
        dependencies.extend(output.dependencies);
        let entry = CompiledPermutation {
            key,
            name: self.emitter.permutation_name(&content_hash),
            content_hash,
            binary_size: output.binary.len(),
            option_defines: permutation.option_defines,
            source_path: permutation.source_path,
            dependencies,
            arguments: output.arguments,
            reflection,
        };

        let insertion = lock(&self.table).insert(key, entry.clone());
        if insertion.is_new() {
            self.emitter.write_binary_header(&entry, &output.binary)?;
        }
        Ok(())
    }

    fn reflect(&self, binary: &[u8]) -> Result<Option<ReflectionData>> {
        let reflection = self
            .backend
            .extract_reflection(binary)
            .map_err(|failure| Error::Backend {
                backend: self.backend.name().to_string(),
                message: format!("reflection failed: {}", failure.message),
            })?;
        if reflection.is_none() && !self.reflection_unavailable.swap(true, Ordering::Relaxed) {
            log::warn!(
                "{} cannot reflect this output; reflection arrays will be empty",
                self.backend.name()
            );
        }
        Ok(reflection)
    }

    /// Keep the first error and stop every worker from taking new work
    fn fail(&self, error: Error) {
        self.abort.store(true, Ordering::Release);
        let mut slot = lock(&self.failure);
        if slot.is_none() {
            log::error!("{}", error);
            *slot = Some(error);
        } else {
            log::debug!("Further failure after abort: {}", error);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

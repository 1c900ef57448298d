//! Permutator Core - shader permutation builds
//!
//! This crate provides:
//! - Option declarations and permutation key layout
//! - A textual usage scan that predicts which permutations compile identically
//! - A multi-threaded scheduler with speculative and content-hash deduplication
//! - C header emission for the unique binaries and the lookup tables
//!
//! Compilers plug in through [`CompilerBackend`].

pub mod backend;
pub mod dedup;
pub mod depfile;
pub mod emit;
pub mod error;
pub mod generator;
pub mod mock;
pub mod option;
pub mod pipeline;
pub mod reflection;
pub mod scanner;
pub mod scheduler;

pub use backend::{BackendFailure, CompileFailure, CompiledBinary, CompilerArguments, CompilerBackend};
pub use dedup::{CompiledPermutation, DeduplicationTable, content_digest};
pub use depfile::DepFileFormat;
pub use emit::{EmitOptions, HeaderEmitter};
pub use error::{Error, Result};
pub use generator::{Permutation, PermutationGenerator, generate_permutations};
pub use option::{Declaration, Define, OptionSet, ShaderOption};
pub use pipeline::{Job, Report, run_job};
pub use reflection::{ReflectionData, ResourceClass, ShaderResource};
pub use scanner::UsageScanner;
pub use scheduler::{RunStats, Scheduler, SchedulerOptions};

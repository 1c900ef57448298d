//! Permutator - offline shader permutation compiler
//!
//! The implementation lives in the workspace crates:
//! - `permutator-core` - options, scheduling, deduplication, header output
//! - `permutator-backends` - dxc, fxc and glslang
//! - `permutator-config` - `permutator.toml` and source watching
//!
//! This crate holds the command line front end.

pub mod app;
pub mod cli;

pub use cli::{Args, USAGE, parse};

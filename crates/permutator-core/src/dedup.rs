//! Deduplication bookkeeping
//!
//! Maps every permutation key to the index of its unique binary, and every
//! content hash to the same index space. The table is not synchronized
//! itself; the scheduler serializes writers behind one mutex and hands the
//! finished table to readers by value.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use crate::option::Define;
use crate::reflection::ReflectionData;

/// Bytes of the BLAKE3 hash kept in the digest
const DIGEST_BYTES: usize = 16;

/// Hex digest identifying a binary's content
pub fn content_digest(binary: &[u8]) -> String {
    let hash = blake3::hash(binary);
    hash.as_bytes()[..DIGEST_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// A permutation whose binary was compiled and kept.
///
/// The binary itself is not stored here; it is written to its header by the
/// compiling thread and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPermutation {
    /// Key of the permutation that first produced this content
    pub key: u32,
    /// `<ShaderName>_<digest>`
    pub name: String,
    pub content_hash: String,
    pub binary_size: usize,
    pub option_defines: Vec<Define>,
    pub source_path: PathBuf,
    pub dependencies: BTreeSet<PathBuf>,
    pub arguments: Vec<String>,
    pub reflection: Option<ReflectionData>,
}

/// Outcome of recording a compiled permutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// First binary with this content
    New(usize),
    /// Content already known, key aliased to the existing index
    Existing(usize),
}

impl Insertion {
    pub fn index(self) -> usize {
        match self {
            Insertion::New(index) | Insertion::Existing(index) => index,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Insertion::New(_))
    }
}

/// Outcome of resolving a speculative duplicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The representative is already known
    Resolved(usize),
    /// Waiting on the representative; resolved when it is inserted
    Parked,
}

#[derive(Debug, Default)]
pub struct DeduplicationTable {
    key_to_index: HashMap<u32, usize>,
    hash_to_index: HashMap<String, usize>,
    unique: Vec<CompiledPermutation>,
    /// Speculative duplicates waiting on their representative's key
    parked: HashMap<u32, Vec<u32>>,
}

impl DeduplicationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a compiled permutation under `key`
    pub fn insert(&mut self, key: u32, compiled: CompiledPermutation) -> Insertion {
        let insertion = match self.hash_to_index.get(&compiled.content_hash) {
            Some(&index) => Insertion::Existing(index),
            None => {
                let index = self.unique.len();
                self.hash_to_index
                    .insert(compiled.content_hash.clone(), index);
                self.unique.push(compiled);
                Insertion::New(index)
            }
        };
        self.record(key, insertion.index());
        insertion
    }

    /// Resolve `key` to whatever `representative` resolved to, or park it
    pub fn resolve_speculative(&mut self, key: u32, representative: u32) -> Resolution {
        match self.key_to_index.get(&representative) {
            Some(&index) => {
                self.record(key, index);
                Resolution::Resolved(index)
            }
            None => {
                self.parked.entry(representative).or_default().push(key);
                Resolution::Parked
            }
        }
    }

    /// Map `key` to `index` and release anything parked on `key`
    fn record(&mut self, key: u32, index: usize) {
        self.key_to_index.insert(key, index);
        let mut pending = self.parked.remove(&key).unwrap_or_default();
        while let Some(waiting) = pending.pop() {
            self.key_to_index.insert(waiting, index);
            if let Some(more) = self.parked.remove(&waiting) {
                pending.extend(more);
            }
        }
    }

    pub fn index_of(&self, key: u32) -> Option<usize> {
        self.key_to_index.get(&key).copied()
    }

    pub fn index_of_hash(&self, content_hash: &str) -> Option<usize> {
        self.hash_to_index.get(content_hash).copied()
    }

    pub fn unique_permutations(&self) -> &[CompiledPermutation] {
        &self.unique
    }

    /// Number of keys resolved so far
    pub fn resolved_count(&self) -> usize {
        self.key_to_index.len()
    }

    pub fn unique_count(&self) -> usize {
        self.unique.len()
    }

    /// Keys still waiting on a representative
    pub fn parked_keys(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.parked.values().flatten().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Unique index for every key in `[0, key_space)`; unknown keys map to 0
    pub fn indirection_table(&self, key_space: u64) -> Vec<usize> {
        (0..key_space)
            .map(|key| {
                u32::try_from(key)
                    .ok()
                    .and_then(|k| self.index_of(k))
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Union of the dependencies of every unique permutation
    pub fn dependencies(&self) -> BTreeSet<PathBuf> {
        self.unique
            .iter()
            .flat_map(|p| p.dependencies.iter().cloned())
            .collect()
    }
}

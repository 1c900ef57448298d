//! Permutation enumeration
//!
//! Options found in the shader are varied in the outer recursion levels and
//! unused options innermost. Any permutation that differs from its first
//! sibling only in an unused option is marked as a speculative duplicate of
//! that sibling; since unused options are innermost, every such mark points
//! at the canonical permutation whose unused options all sit at index 0.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::option::{Define, OptionSet};

/// One concrete assignment of values to every option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    pub key: u32,
    /// Active defines in declaration order; `-` values contribute nothing
    pub option_defines: Vec<Define>,
    pub source_path: PathBuf,
    pub dependencies: BTreeSet<PathBuf>,
    /// Key of an earlier permutation predicted to compile identically
    pub identical_to: Option<u32>,
}

impl Permutation {
    pub fn is_speculative_duplicate(&self) -> bool {
        self.identical_to.is_some()
    }
}

/// Enumerates the cross product of an [`OptionSet`]
pub struct PermutationGenerator<'a> {
    options: &'a OptionSet,
    source_path: &'a Path,
    dependencies: &'a BTreeSet<PathBuf>,
    order: Vec<usize>,
}

impl<'a> PermutationGenerator<'a> {
    pub fn new(
        options: &'a OptionSet,
        source_path: &'a Path,
        dependencies: &'a BTreeSet<PathBuf>,
    ) -> Self {
        Self {
            options,
            source_path,
            dependencies,
            order: options.partitioned_order(),
        }
    }

    /// Produce every permutation in enumeration order
    pub fn generate(&self) -> Vec<Permutation> {
        let mut permutations = Vec::with_capacity(self.options.permutation_count());
        let mut selection = vec![0usize; self.options.len()];
        self.recurse(0, 0, None, &mut selection, &mut permutations);
        permutations
    }

    fn recurse(
        &self,
        depth: usize,
        key: u32,
        identical_to: Option<u32>,
        selection: &mut [usize],
        out: &mut Vec<Permutation>,
    ) {
        let Some(&option_index) = self.order.get(depth) else {
            out.push(self.leaf(key, identical_to, selection));
            return;
        };

        let option = &self.options.options()[option_index];
        for value_index in 0..option.values.len() {
            selection[option_index] = value_index;
            let child_key = key | option.key_bits(value_index);
            // The first sibling still has this option's bits at zero, so its
            // key at this level equals the parent's
            let child_identical = match identical_to {
                Some(representative) => Some(representative),
                None if !option.found_in_shader && value_index != 0 => Some(key),
                None => None,
            };
            self.recurse(depth + 1, child_key, child_identical, selection, out);
        }
        selection[option_index] = 0;
    }

    fn leaf(&self, key: u32, identical_to: Option<u32>, selection: &[usize]) -> Permutation {
        let option_defines = self
            .options
            .options()
            .iter()
            .zip(selection)
            .filter_map(|(option, &index)| option.define_for(index))
            .collect();
        Permutation {
            key,
            option_defines,
            source_path: self.source_path.to_path_buf(),
            dependencies: self.dependencies.clone(),
            identical_to,
        }
    }
}

/// Convenience wrapper around [`PermutationGenerator`]
pub fn generate_permutations(
    options: &OptionSet,
    source_path: &Path,
    dependencies: &BTreeSet<PathBuf>,
) -> Vec<Permutation> {
    PermutationGenerator::new(options, source_path, dependencies).generate()
}

/// Number of permutations expected to resolve without compiling
pub fn count_speculative(permutations: &[Permutation]) -> usize {
    permutations
        .iter()
        .filter(|p| p.is_speculative_duplicate())
        .count()
}

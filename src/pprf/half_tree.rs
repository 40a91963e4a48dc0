//! One correction per level.
//!
//! The COT pair `(k₁, k₁ ⊕ Δ)` of a tree is its first level, so the root is Δ.
//! Because every level XORs to Δ, `K1ᵢ = K0ᵢ ⊕ Δ` and a single correction
//! `cᵢ = K0ᵢ ⊕ kᵢ` for `i = 2..=h` suffices: the receiver's chosen key
//! `kᵢ ⊕ ᾱᵢ·Δ` unmasks exactly `K_{i,ᾱᵢ}`. Nodes must be expanded with a
//! circular correlation robust hash since Δ appears in both inputs and outputs.
use crate::{block::Block, ggm::builder::Expansion};

/// Number of correction blocks for a batch.
pub(crate) fn correction_len(batch_num: usize, height: usize) -> usize {
    batch_num * (height - 1)
}

/// `K0ᵢ ⊕ kᵢ` for the levels below the first, tree-major.
///
/// `pairs` holds `height` COT pairs per tree.
pub(crate) fn corrections(trees: &[Expansion], pairs: &[[Block; 2]], height: usize) -> Vec<Block> {
    trees
        .iter()
        .zip(pairs.chunks_exact(height))
        .flat_map(|(tree, pairs)| {
            tree.sums
                .iter()
                .zip(pairs)
                .skip(1)
                .map(|([k0, _], [key, _])| *k0 ^ *key)
        })
        .collect()
}

/// `K_{i,ᾱᵢ}` for every level of every tree, tree-major.
///
/// The first level is the chosen key itself.
pub(crate) fn sibling_sums(corrections: &[Block], keys: &[Block], height: usize) -> Vec<Block> {
    let per_tree = height - 1;
    keys.chunks_exact(height)
        .enumerate()
        .flat_map(move |(tree, keys)| {
            let corrections = &corrections[tree * per_tree..(tree + 1) * per_tree];
            std::iter::once(keys[0]).chain(
                corrections
                    .iter()
                    .zip(&keys[1..])
                    .map(|(correction, key)| *correction ^ *key),
            )
        })
        .collect()
}

//! Sender side tree expansion.
use rayon::prelude::*;

use crate::{
    block::Block,
    config::PAR_LEVEL_THRESHOLD,
    crypto::Expander,
    ggm::{LevelInspector, level_sums},
};

/// A fully expanded tree.
pub(crate) struct Expansion {
    /// All `2^h` leaves, not cropped.
    pub(crate) leaves: Vec<Block>,
    /// `[K0ᵢ, K1ᵢ]` for the levels `i = 1..=h`.
    pub(crate) sums: Vec<[Block; 2]>,
}

/// Expands the children of every parent into a new level.
pub(crate) fn expand_level(parents: &[Block], expander: &Expander, parallel: bool) -> Vec<Block> {
    let mut children = vec![Block::ZERO; 2 * parents.len()];
    if parallel && parents.len() >= PAR_LEVEL_THRESHOLD {
        children
            .par_chunks_mut(2 * PAR_LEVEL_THRESHOLD)
            .zip(parents.par_chunks(PAR_LEVEL_THRESHOLD))
            .for_each(|(children, parents)| expand_chunk(parents, children, expander));
    } else {
        expand_chunk(parents, &mut children, expander);
    }
    children
}

fn expand_chunk(parents: &[Block], children: &mut [Block], expander: &Expander) {
    let mut left = parents.to_vec();
    expander.left_slice_mut(&mut left);
    for ((pair, parent), left) in children.chunks_exact_mut(2).zip(parents).zip(left) {
        pair[0] = left;
        pair[1] = left ^ *parent;
    }
}

/// Expands a tree of height `height >= 1` from its first level.
///
/// Level 0 is `level1[0] ⊕ level1[1]`, so a pair of children of a root as well
/// as a COT pair `(k, k ⊕ Δ)` describe a tree rooted at the XOR of both.
pub(crate) fn build(
    level1: [Block; 2],
    height: usize,
    expander: &Expander,
    parallel: bool,
    inspect: Option<&LevelInspector<'_>>,
) -> Expansion {
    debug_assert!(height >= 1);
    if let Some(inspect) = inspect {
        inspect(0, &[level1[0] ^ level1[1]]);
    }
    let mut nodes = level1.to_vec();
    let mut sums = Vec::with_capacity(height);
    for level in 1..=height {
        if level > 1 {
            nodes = expand_level(&nodes, expander, parallel);
        }
        if let Some(inspect) = inspect {
            inspect(level, &nodes);
        }
        sums.push(level_sums(&nodes));
    }
    Expansion {
        leaves: nodes,
        sums,
    }
}

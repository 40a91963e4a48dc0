//! Two corrections per level, each masked with a hash of one OT key.
//!
//! For the OT with global index `t` the sender sends
//! `Cᵢ,b = Kᵢ,b ⊕ H(t, k_b)` for both `b`. The receiver can only unmask the
//! correction of its choice bit, which is the sibling class of its path. `H`
//! is the tweakable circular correlation robust hash, the OT keys differ by Δ.
use crate::{block::Block, crypto::AesHash, ggm::builder::Expansion};

/// Number of correction blocks for a batch.
pub(crate) fn correction_len(batch_num: usize, height: usize) -> usize {
    batch_num * height * 2
}

/// Masks the level sums of every tree, tree-major and level-major.
///
/// `pairs` holds `height` OT key pairs per tree, `tweak_offset` is the global
/// index of the first one.
pub(crate) fn corrections(
    trees: &[Expansion],
    pairs: &[[Block; 2]],
    hash: &AesHash,
    tweak_offset: usize,
) -> Vec<Block> {
    let mut masks = bytemuck::cast_slice::<[Block; 2], Block>(pairs).to_vec();
    hash.tccr_hash_slice_mut(&mut masks, |i| Block::from(tweak_offset + i / 2));
    let sums = trees.iter().flat_map(|tree| tree.sums.iter().flatten());
    masks.iter().zip(sums).map(|(mask, sum)| *mask ^ *sum).collect()
}

/// Unmasks `K_{i,cᵢ}` for every OT, with `cᵢ` the choice bit and `keys` the
/// chosen keys.
pub(crate) fn sibling_sums(
    corrections: &[Block],
    keys: &[Block],
    choices: &[bool],
    hash: &AesHash,
    tweak_offset: usize,
) -> Vec<Block> {
    let mut masks = keys.to_vec();
    hash.tccr_hash_slice_mut(&mut masks, |i| Block::from(tweak_offset + i));
    masks
        .iter()
        .zip(corrections.chunks_exact(2))
        .zip(choices)
        .map(|((mask, correction), choice)| *mask ^ correction[*choice as usize])
        .collect()
}

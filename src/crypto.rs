//! Primitives for tree expansion and OT key hashing.
//!
//! [`Primitives`] bundles the length-doubling PRG `G` and the hashes `H` a
//! session needs. Which expansion function is used depends on the [`Variant`]:
//! the naive protocol only needs a PRG, while the half-tree protocol shares one
//! Δ across the first level of all trees and needs a circular correlation
//! robust hash for that.
mod aes_hash;
mod prg;

pub(crate) use aes_hash::AesHash;
pub(crate) use prg::TwoKeyPrg;

use crate::{block::Block, config::Variant};

/// Number of Blocks for which hardware accelerated AES can make use of ILP.
///
/// This corresponds to `ParBlocksSize` in [`aes::cipher::ParBlocksSizeUser`]
/// for the SIMD backend on the target architecture. Its value must not
/// influence correctness or network messages.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub(crate) const AES_PAR_BLOCKS: usize = 9;
#[cfg(target_arch = "aarch64")]
pub(crate) const AES_PAR_BLOCKS: usize = 21;
#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
pub(crate) const AES_PAR_BLOCKS: usize = 4;

/// Key of the fixed-key hashes. The key was randomly chosen, any key would be okay.
const FIXED_HASH_KEY: u128 = 193502124791825095790518994062991136444;

/// Computes the left child of a node. The right child is `left ⊕ parent`, which
/// keeps every level XOR-summing to the root.
#[derive(Clone)]
pub(crate) enum Expander {
    /// First half of `G(parent)`.
    Prg(TwoKeyPrg),
    /// `H(parent)` with `H` circular correlation robust.
    Ccr(AesHash),
}

impl Expander {
    /// Replaces every parent in `nodes` with its left child.
    pub(crate) fn left_slice_mut(&self, nodes: &mut [Block]) {
        match self {
            Expander::Prg(prg) => prg.left_slice_mut(nodes),
            Expander::Ccr(hash) => hash.ccr_hash_slice_mut(nodes),
        }
    }

    /// Both children of `parent`.
    pub(crate) fn children(&self, parent: Block) -> [Block; 2] {
        let left = match self {
            Expander::Prg(prg) => prg.expand(parent)[0],
            Expander::Ccr(hash) => hash.ccr_hash_block(parent),
        };
        [left, left ^ parent]
    }
}

/// The PRG and hash instances of one session.
#[derive(Clone)]
pub(crate) struct Primitives {
    pub(crate) expander: Expander,
    /// Masks OT keys in the naive level protocol.
    pub(crate) key_hash: AesHash,
}

impl Primitives {
    pub(crate) fn new(variant: Variant) -> Self {
        let hash = AesHash::with_key(Block::from(FIXED_HASH_KEY));
        let expander = match variant {
            Variant::Naive => Expander::Prg(TwoKeyPrg::new(Block::ZERO, Block::ONE)),
            Variant::HalfTree => Expander::Ccr(hash.clone()),
        };
        Self {
            expander,
            key_hash: hash,
        }
    }
}

//! GGM trees with XOR-homomorphic children.
//!
//! Level `i` of a tree of height `h` has `2^i` nodes. A parent `p` has the
//! children `left = G₀(p)` and `right = left ⊕ p`, so the nodes of every full
//! level XOR to the root. The sender expands complete trees, the receiver
//! rebuilds all leaves but one knowing only the XOR of one parity class per
//! level.
use serde::{Deserialize, Serialize};

use crate::block::Block;

pub(crate) mod builder;
pub(crate) mod reconstruct;

/// A leaf as seen by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leaf {
    /// A leaf value known to the receiver, equal to the sender's leaf.
    Present(Block),
    /// The punctured leaf. Its value is never available to the receiver.
    Punctured,
}

impl Leaf {
    /// The leaf value, `None` if punctured.
    pub fn value(&self) -> Option<Block> {
        match self {
            Leaf::Present(b) => Some(*b),
            Leaf::Punctured => None,
        }
    }

    /// Whether this is the punctured leaf.
    pub fn is_punctured(&self) -> bool {
        matches!(self, Leaf::Punctured)
    }
}

/// Height `h = ⌈log₂(each_num)⌉` of a tree with `each_num` leaves.
///
/// `each_num` must be positive.
pub fn tree_height(each_num: usize) -> usize {
    each_num.next_power_of_two().trailing_zeros() as usize
}

/// The receiver's OT choice bits for puncturing `alpha`, level 1 first.
///
/// These are the complemented bits of `alpha`, most significant first, so the
/// receiver learns the sibling of its path at every level.
pub fn choice_bits(alpha: usize, height: usize) -> impl Iterator<Item = bool> {
    (1..=height).map(move |level| !path_bit(alpha, height, level))
}

/// Bit of `alpha` selecting the child at `level`.
pub(crate) fn path_bit(alpha: usize, height: usize, level: usize) -> bool {
    (alpha >> (height - level)) & 1 == 1
}

/// `[XOR of even nodes, XOR of odd nodes]` of a level.
pub(crate) fn level_sums(nodes: &[Block]) -> [Block; 2] {
    let mut sums = [Block::ZERO; 2];
    for pair in nodes.chunks(2) {
        sums[0] ^= pair[0];
        if let Some(odd) = pair.get(1) {
            sums[1] ^= *odd;
        }
    }
    sums
}

/// Called with `(level, nodes)` for every level of a tree, root first.
pub(crate) type LevelInspector<'a> = dyn Fn(usize, &[Block]) + Send + Sync + 'a;

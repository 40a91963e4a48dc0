//! Receiver side reconstruction of a punctured tree.
use crate::{
    block::Block,
    crypto::Expander,
    ggm::{Leaf, builder::expand_level, path_bit},
};

/// A tree known everywhere except on the path to `alpha`.
pub(crate) struct Punctured {
    /// All `2^h` leaves, the one at `alpha` is [`Block::ZERO`].
    pub(crate) leaves: Vec<Block>,
    pub(crate) alpha: usize,
}

impl Punctured {
    /// XOR of all known leaves of the full level. Equals `root ⊕ leaf[alpha]`.
    pub(crate) fn complement_sum(&self) -> Block {
        Block::xor_all(&self.leaves)
    }

    /// The first `each_num` leaves with `alpha` tagged as punctured.
    pub(crate) fn crop(&self, each_num: usize) -> Vec<Leaf> {
        self.leaves[..each_num]
            .iter()
            .enumerate()
            .map(|(i, leaf)| {
                if i == self.alpha {
                    Leaf::Punctured
                } else {
                    Leaf::Present(*leaf)
                }
            })
            .collect()
    }
}

/// Rebuilds every leaf except `alpha` of a tree of height `height >= 1`.
///
/// `sibling_sums[i - 1]` is the XOR of all nodes at level `i` whose parity
/// differs from the path to `alpha`, i.e. `K_{i, ᾱᵢ}`.
pub(crate) fn reconstruct(
    alpha: usize,
    height: usize,
    sibling_sums: &[Block],
    expander: &Expander,
    parallel: bool,
) -> Punctured {
    debug_assert!(height >= 1 && sibling_sums.len() == height);
    let mut nodes = vec![Block::ZERO; 2];
    let mut hole = 0;
    for (level, sum) in (1..=height).zip(sibling_sums) {
        if level > 1 {
            nodes = expand_level(&nodes, expander, parallel);
            // children of the unknown node are garbage
            nodes[2 * hole] = Block::ZERO;
            nodes[2 * hole + 1] = Block::ZERO;
        }
        let bit = path_bit(alpha, height, level);
        hole = 2 * hole + bit as usize;
        let sibling = hole ^ 1;
        let known = nodes
            .iter()
            .skip(sibling & 1)
            .step_by(2)
            .fold(Block::ZERO, |acc, node| acc ^ *node);
        nodes[sibling] = *sum ^ known;
    }
    Punctured {
        leaves: nodes,
        alpha,
    }
}

#[cfg(test)]
mod tests {
    use rand::random;

    use super::*;
    use crate::{config::Variant, crypto::Primitives, ggm::builder::build};

    #[test]
    fn reconstructs_all_but_alpha() {
        for variant in [Variant::Naive, Variant::HalfTree] {
            let expander = Primitives::new(variant).expander;
            for height in 1..=6 {
                let root: Block = random();
                let tree = build(expander.children(root), height, &expander, false, None);
                for alpha in 0..1 << height {
                    let sums: Vec<Block> = tree
                        .sums
                        .iter()
                        .enumerate()
                        .map(|(i, sums)| {
                            let bit = path_bit(alpha, height, i + 1);
                            sums[!bit as usize]
                        })
                        .collect();
                    let punctured = reconstruct(alpha, height, &sums, &expander, false);
                    for (i, (s, r)) in tree.leaves.iter().zip(&punctured.leaves).enumerate() {
                        if i == alpha {
                            assert_eq!(Block::ZERO, *r);
                        } else {
                            assert_eq!(s, r);
                        }
                    }
                    assert_eq!(root ^ tree.leaves[alpha], punctured.complement_sum());
                }
            }
        }
    }

    #[test]
    fn crop_tags_alpha() {
        let punctured = Punctured {
            leaves: (0..8_u128).map(Block::from).collect(),
            alpha: 5,
        };
        let leaves = punctured.crop(6);
        assert_eq!(6, leaves.len());
        assert_eq!(Leaf::Present(Block::from(4_u128)), leaves[4]);
        assert_eq!(Leaf::Punctured, leaves[5]);
    }
}

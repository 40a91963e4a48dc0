//! Length-doubling PRG `G: {0,1}^128 → {0,1}^256` from two fixed-key AES
//! permutations, `G(x) = (π₀(x) ⊕ x ‖ π₁(x) ⊕ x)`.
use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, KeyInit},
};

use crate::{block::Block, crypto::AES_PAR_BLOCKS};

#[derive(Clone)]
pub(crate) struct TwoKeyPrg {
    aes: [Aes128; 2],
}

impl TwoKeyPrg {
    pub(crate) fn new(key0: Block, key1: Block) -> Self {
        Self {
            aes: [Aes128::new(&key0.into()), Aes128::new(&key1.into())],
        }
    }

    /// Both halves of `G(seed)`.
    pub(crate) fn expand(&self, seed: Block) -> [Block; 2] {
        self.aes.each_ref().map(|aes| {
            let mut enc = seed.into();
            aes.encrypt_block(&mut enc);
            seed ^ enc.into()
        })
    }

    /// Replaces every seed in `x` with the first half of `G(seed)`.
    pub(crate) fn left_slice_mut(&self, x: &mut [Block]) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];
        for chunk in x.chunks_mut(AES_PAR_BLOCKS) {
            self.aes[0]
                .encrypt_blocks_b2b(bytemuck::cast_slice(chunk), &mut tmp[..chunk.len()])
                .expect("in and out always have same length");
            chunk
                .iter_mut()
                .zip(tmp)
                .for_each(|(x, x_enc)| *x ^= x_enc.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::random;

    use super::*;

    #[test]
    fn left_slice_is_first_half_of_expand() {
        let prg = TwoKeyPrg::new(Block::ZERO, Block::ONE);
        let seeds: Vec<Block> = (0..AES_PAR_BLOCKS + 3).map(|_| random()).collect();
        let mut left = seeds.clone();
        prg.left_slice_mut(&mut left);
        for (seed, left) in seeds.iter().zip(&left) {
            let [l, r] = prg.expand(*seed);
            assert_eq!(l, *left);
            assert_ne!(l, r);
        }
    }

    #[test]
    fn expand_is_deterministic() {
        let prg = TwoKeyPrg::new(Block::ZERO, Block::ONE);
        let seed: Block = random();
        assert_eq!(prg.expand(seed), prg.expand(seed));
    }
}

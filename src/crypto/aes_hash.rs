//! Fixed-key AES hashes.
//!
//! The constructions follow <https://eprint.iacr.org/2019/074>. All of them
//! model the fixed-key AES permutation `π` as a random permutation.
use aes::{
    Aes128,
    cipher::{BlockCipherEncrypt, Key, KeyInit},
};

use crate::{block::Block, crypto::AES_PAR_BLOCKS};

/// AES accelerated hashing of [`Block`]s.
#[derive(Clone)]
pub(crate) struct AesHash {
    aes: Aes128,
}

impl AesHash {
    /// Create a new `AesHash` with the given key.
    pub(crate) fn new(key: &Key<Aes128>) -> Self {
        Self {
            aes: Aes128::new(key),
        }
    }

    /// Create a new `AesHash` keyed with a [`Block`].
    pub(crate) fn with_key(key: Block) -> Self {
        Self::new(&key.into())
    }

    /// Circular correlation robust hash of a block.
    ///
    /// Calculates `π(σ(x)) ^ σ(x)` where `σ` is the linear orthomorphism
    /// `σ(xₗ ‖ xᵣ) = (xₗ ⊕ xᵣ ‖ xₗ)`. Unlike the plain `π(x) ^ x` this stays
    /// pseudorandom when inputs are correlated with a secret offset that also
    /// appears in the outputs, i.e. for `H(x ⊕ Δ) ⊕ Δ`.
    pub(crate) fn ccr_hash_block(&self, x: Block) -> Block {
        let s = sigma(x);
        let mut s_enc = s.into();
        self.aes.encrypt_block(&mut s_enc);
        s ^ s_enc.into()
    }

    /// Circular correlation robust hash of a slice of blocks, in-place.
    ///
    /// Same as [`AesHash::ccr_hash_block`] for every element, batched to make
    /// use of AES instruction-level parallelism.
    pub(crate) fn ccr_hash_slice_mut(&self, x: &mut [Block]) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];
        for chunk in x.chunks_mut(AES_PAR_BLOCKS) {
            chunk.iter_mut().for_each(|x| *x = sigma(*x));
            self.aes
                .encrypt_blocks_b2b(bytemuck::cast_slice(chunk), &mut tmp[..chunk.len()])
                .expect("in and out always have same length");
            chunk
                .iter_mut()
                .zip(tmp)
                .for_each(|(x, x_enc)| *x ^= x_enc.into());
        }
    }

    /// Tweakable circular correlation robust hash function.
    ///
    /// Calculates `π(π(x) ^ tweak) ^ π(x)` for a single block. This is the TMMO function.
    #[cfg(test)]
    pub(crate) fn tccr_hash_block(&self, tweak: Block, x: Block) -> Block {
        let mut x_enc = x.into();
        self.aes.encrypt_block(&mut x_enc);
        let mut x_enc_xor_tweak_enc = (Block::from(x_enc) ^ tweak).into();
        self.aes.encrypt_block(&mut x_enc_xor_tweak_enc);

        Block::from(x_enc_xor_tweak_enc) ^ Block::from(x_enc)
    }

    /// Tweakable circular correlation robust hash function.
    ///
    /// Calculates `π(π(x) ^ tweak(i)) ^ π(x)` in-place where i is the index of the block in x.
    pub(crate) fn tccr_hash_slice_mut(
        &self,
        x: &mut [Block],
        mut tweak_fn: impl FnMut(usize) -> Block,
    ) {
        let mut tmp = [aes::Block::default(); AES_PAR_BLOCKS];
        for (chunk_idx, chunk) in x.chunks_mut(AES_PAR_BLOCKS).enumerate() {
            // Write π(x) to tmp
            self.aes
                .encrypt_blocks_b2b(bytemuck::cast_slice(chunk), &mut tmp[..chunk.len()])
                .expect("in and out always have same length");
            // Write π(x) ^ i to x
            chunk
                .iter_mut()
                .zip(&tmp)
                .enumerate()
                .for_each(|(idx, (dest, x_enc))| {
                    *dest = Block::from(*x_enc) ^ tweak_fn(chunk_idx * AES_PAR_BLOCKS + idx);
                });
            // write π(π(x) ^ i) to x
            self.aes.encrypt_blocks(bytemuck::cast_slice_mut(chunk));
            // write π(π(x) ^ i) ^ π(x) to x
            chunk
                .iter_mut()
                .zip(tmp)
                .for_each(|(x, x_enc)| *x ^= x_enc.into());
        }
    }
}

/// `σ(xₗ ‖ xᵣ) = (xₗ ⊕ xᵣ ‖ xₗ)` with `xₗ` the high half.
#[inline]
fn sigma(x: Block) -> Block {
    Block::from([x.high(), x.high() ^ x.low()])
}

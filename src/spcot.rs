//! Single-point and regular multi-point correlated OT from Δ-rooted trees.
//!
//! If every tree is rooted at the COT offset Δ, each full leaf level XORs to Δ.
//! The receiver then learns `w_α = v_α ⊕ Δ` as the XOR of all its known leaves,
//! without any further communication. The vectors satisfy
//! `w = v ⊕ Δ·e_α`, which is a single-point COT of length `each_num`.
//!
//! Concatenating a batch of trees gives a regular multi-point COT with one
//! noisy position per bin of `each_num` entries, as used by LPN-based COT
//! extension.
use crate::{
    block::Block,
    error::{Error, Precondition},
    ggm::Leaf,
    pprf::{ReceiverOutput, ReceiverTree, SenderOutput},
};

/// The receiver's half of a regular multi-point COT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpcotReceiver {
    /// `w = v ⊕ Σ Δ·e_p` over all noisy positions `p`.
    pub vector: Vec<Block>,
    /// One noisy position per bin, ascending.
    pub positions: Vec<usize>,
}

/// The sender's vectors `v`, one per tree.
pub fn sender_vectors(output: &SenderOutput) -> Result<Vec<Vec<Block>>, Error> {
    if output.delta.is_none() {
        return Err(Precondition::UncorrelatedOutput.into());
    }
    Ok(output.trees.iter().map(|tree| tree.leaves.clone()).collect())
}

/// The receiver's vectors `w`, one per tree.
pub fn receiver_vectors(output: &ReceiverOutput) -> Result<Vec<Vec<Block>>, Error> {
    output.trees.iter().map(receiver_vector).collect()
}

fn receiver_vector(tree: &ReceiverTree) -> Result<Vec<Block>, Error> {
    let w_alpha = tree
        .complement_sum
        .ok_or(Precondition::UncorrelatedOutput)?;
    Ok(tree
        .leaves
        .iter()
        .map(|leaf| match leaf {
            Leaf::Present(v) => *v,
            Leaf::Punctured => w_alpha,
        })
        .collect())
}

/// The sender's vector of length `batch_num · each_num`.
pub fn regular_mpcot_sender(output: &SenderOutput) -> Result<Vec<Block>, Error> {
    Ok(sender_vectors(output)?.concat())
}

/// The receiver's vector of length `batch_num · each_num` and its noisy positions.
pub fn regular_mpcot_receiver(output: &ReceiverOutput) -> Result<MpcotReceiver, Error> {
    let vector = receiver_vectors(output)?.concat();
    let positions = output
        .trees
        .iter()
        .enumerate()
        .map(|(bin, tree)| bin * output.each_num + tree.alpha)
        .collect();
    Ok(MpcotReceiver { vector, positions })
}

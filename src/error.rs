//! The single error type returned by a failed puncturing.
//!
//! A call either yields a valid output for every tree of the batch or one of
//! these errors, never a partial batch.
use thiserror::Error;

use crate::{channel, cot};

/// Errors occurring while puncturing a batch of trees.
#[derive(Debug, Error)]
pub enum Error {
    /// The peer sent a payload that does not fit the protocol. Fatal.
    #[error("protocol aborted: {0}")]
    Abort(#[from] Abort),
    /// The call was rejected before any message was exchanged.
    #[error("precondition violated: {0}")]
    Precondition(#[from] Precondition),
    /// The correlated OT primitive failed. Propagated as is, never retried.
    #[error("correlated OT failed")]
    Cot(#[from] cot::Error),
    /// A message could not be sent or received.
    #[error("channel error")]
    Channel(#[from] channel::Error),
}

/// Reasons for aborting a running protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Abort {
    /// The correction payload has the wrong number of blocks.
    #[error("expected {expected} correction blocks, received {actual}")]
    CorrectionLength {
        /// Blocks implied by the batch shape.
        expected: usize,
        /// Blocks actually received.
        actual: usize,
    },
    /// The correlated OT returned the wrong number of outputs.
    #[error("requested {expected} correlated OTs, got {actual}")]
    CotCount {
        /// Number of requested OTs.
        expected: usize,
        /// Number of returned OTs.
        actual: usize,
    },
    /// The OT key pairs do not differ by the same offset Δ.
    #[error("OT key pairs are not correlated by Δ")]
    CotCorrelation,
}

/// Invalid arguments, detected before any network I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Precondition {
    /// `batch_num` is 0.
    #[error("batch must contain at least one tree")]
    EmptyBatch,
    /// `each_num` is 0.
    #[error("trees must have at least one leaf")]
    EmptyTree,
    /// `each_num` exceeds `2^MAX_HEIGHT`.
    #[error("{each_num} leaves exceed the maximum tree size")]
    TreeTooLarge {
        /// The requested number of leaves.
        each_num: usize,
    },
    /// The receiver passed a different number of puncture indices than trees.
    #[error("expected {expected} puncture indices, got {actual}")]
    AlphaCount {
        /// The number of trees.
        expected: usize,
        /// The number of indices.
        actual: usize,
    },
    /// A puncture index lies outside of `[0, each_num)`.
    #[error("puncture index {alpha} of tree {tree} is not below {each_num}")]
    AlphaOutOfRange {
        /// Index of the tree in the batch.
        tree: usize,
        /// The offending puncture index.
        alpha: usize,
        /// Number of leaves per tree.
        each_num: usize,
    },
    /// The half-tree protocol roots every tree at Δ.
    #[error("the half-tree variant requires Δ as root")]
    HalfTreeNeedsDelta,
    /// The configured OT role mapping is not supported by the level protocols.
    #[error("the pprf sender cannot act as OT {pprf_sender:?}")]
    RoleMapping {
        /// The configured OT role of the pprf sender.
        pprf_sender: cot::OtRole,
    },
    /// `puncture` was called before `init`.
    #[error("session is not initialized")]
    NotInitialized,
    /// Converting to correlated vectors needs trees rooted at Δ.
    #[error("trees are not rooted at Δ")]
    UncorrelatedOutput,
}

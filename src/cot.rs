//! Correlated oblivious transfer (COT) as consumed by the tree protocols.
//!
//! A COT hands the sender `n` key pairs `(k₀, k₁)` with `k₁ = k₀ ⊕ Δ` for one
//! global offset Δ, and the receiver the key selected by each of its choice
//! bits. The traits in this module are the boundary to an external COT
//! implementation; [`ideal`] provides a dealer-simulated one for tests.
//!
//! The roles in the OT are tracked separately from the roles in the punctured
//! PRF, see [`OtRole`], [`PprfRole`] and
//! [`OtRoleMapping`](crate::config::OtRoleMapping).
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    block::Block,
    channel::{self, Channel},
    error::Abort,
};

pub mod ideal;

/// Errors raised by a correlated OT implementation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OT messages could not be exchanged.
    #[error(transparent)]
    Channel(#[from] channel::Error),
    /// `send` or `receive` was called before `init`.
    #[error("correlated OT is not initialized")]
    NotInitialized,
    /// The peer sent choice bits that do not match the number of OTs.
    #[error("expected {expected} choice bits")]
    InvalidChoiceBits {
        /// The number of OTs of the call.
        expected: usize,
    },
    /// Any other failure of the underlying OT implementation.
    #[error("{0}")]
    Primitive(String),
}

/// A party's role in the correlated OT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtRole {
    /// Holds Δ and all key pairs.
    Sender,
    /// Holds the chosen keys.
    Receiver,
}

impl OtRole {
    /// The role of the peer.
    pub fn other(self) -> Self {
        match self {
            OtRole::Sender => OtRole::Receiver,
            OtRole::Receiver => OtRole::Sender,
        }
    }
}

/// A party's role in the punctured PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PprfRole {
    /// Knows every leaf.
    Sender,
    /// Knows every leaf except the punctured one.
    Receiver,
}

/// Sender side of a correlated OT.
// futures are awaited on the session's task and carry no `Send` bound
#[allow(async_fn_in_trait)]
pub trait CotSender {
    /// Runs any one-time setup, fixing Δ.
    async fn init(&mut self, channel: &impl Channel, peer: usize) -> Result<(), Error>;

    /// The global offset Δ, available after [`CotSender::init`].
    fn delta(&self) -> Result<Block, Error>;

    /// Runs `n` correlated OTs with the receiver, returning the key pairs
    /// `[k₀, k₀ ⊕ Δ]` in OT order.
    async fn send(
        &mut self,
        channel: &impl Channel,
        peer: usize,
        n: usize,
    ) -> Result<Vec<[Block; 2]>, Error>;
}

/// Receiver side of a correlated OT.
#[allow(async_fn_in_trait)]
pub trait CotReceiver {
    /// Runs any one-time setup.
    async fn init(&mut self, channel: &impl Channel, peer: usize) -> Result<(), Error>;

    /// Runs one correlated OT per choice bit, returning `k_c` for each choice `c`.
    async fn receive(
        &mut self,
        channel: &impl Channel,
        peer: usize,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error>;
}

/// Requests `n` key pairs and checks that exactly `n` were returned.
pub(crate) async fn send_pairs(
    cot: &mut impl CotSender,
    channel: &impl Channel,
    peer: usize,
    n: usize,
) -> Result<Vec<[Block; 2]>, crate::Error> {
    let pairs = cot.send(channel, peer, n).await?;
    trace!(requested = n, returned = pairs.len(), "cot send done");
    if pairs.len() != n {
        return Err(Abort::CotCount {
            expected: n,
            actual: pairs.len(),
        }
        .into());
    }
    Ok(pairs)
}

/// Requests one key per choice bit and checks the number of returned keys.
pub(crate) async fn receive_keys(
    cot: &mut impl CotReceiver,
    channel: &impl Channel,
    peer: usize,
    choices: &[bool],
) -> Result<Vec<Block>, crate::Error> {
    let keys = cot.receive(channel, peer, choices).await?;
    trace!(requested = choices.len(), returned = keys.len(), "cot receive done");
    if keys.len() != choices.len() {
        return Err(Abort::CotCount {
            expected: choices.len(),
            actual: keys.len(),
        }
        .into());
    }
    Ok(keys)
}

/// Checks that every pair differs by exactly `delta`.
pub(crate) fn check_correlation(pairs: &[[Block; 2]], delta: Block) -> Result<(), Abort> {
    if pairs.iter().all(|[k0, k1]| (*k0 ^ *k1) == delta) {
        Ok(())
    } else {
        Err(Abort::CotCorrelation)
    }
}

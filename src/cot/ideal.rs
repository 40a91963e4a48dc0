//! A dealer-simulated correlated OT.
//!
//! Both parties derive the same dealer randomness from a shared session label,
//! so this is **not** a secure OT: the receiver can recompute Δ and every key.
//! It is useful to test and benchmark the tree protocols in isolation.
//!
//! The dealer hands out random COTs `(k₀, k₀ ⊕ Δ)` / `(r, k_r)`. The
//! receiver's actual choices `c` are then transferred like in a real OT
//! extension by sending `d = r ⊕ c`, after which the sender shifts each pair by
//! `d·Δ`. The choice message is the only communication.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::{Level, debug, instrument};

use crate::{
    block::Block,
    channel::{Channel, recv_from, send_to},
    cot::{CotReceiver, CotSender, Error},
    utils::{pack_bits, unpack_bits},
};

const DEALER_CONTEXT: &str = "ggm-dpprf 2025 ideal correlated OT dealer";

fn dealer(label: &[u8]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(blake3::derive_key(DEALER_CONTEXT, label))
}

/// Creates both halves of an ideal COT sharing the dealer identified by `label`.
pub fn ideal_cot(label: &[u8]) -> (IdealCotSender, IdealCotReceiver) {
    (IdealCotSender::new(label), IdealCotReceiver::new(label))
}

/// Sender half of the ideal COT.
#[derive(Debug)]
pub struct IdealCotSender {
    dealer: ChaCha20Rng,
    delta: Option<Block>,
    calls: usize,
    ots: usize,
}

impl IdealCotSender {
    /// Creates a sender with the dealer identified by `label`.
    pub fn new(label: &[u8]) -> Self {
        Self {
            dealer: dealer(label),
            delta: None,
            calls: 0,
            ots: 0,
        }
    }

    /// Number of [`CotSender::send`] calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Number of OTs sent so far.
    pub fn ots(&self) -> usize {
        self.ots
    }
}

impl CotSender for IdealCotSender {
    #[instrument(level = Level::DEBUG, skip_all, err)]
    async fn init(&mut self, _channel: &impl Channel, _peer: usize) -> Result<(), Error> {
        self.delta = Some(self.dealer.random());
        Ok(())
    }

    fn delta(&self) -> Result<Block, Error> {
        self.delta.ok_or(Error::NotInitialized)
    }

    async fn send(
        &mut self,
        channel: &impl Channel,
        peer: usize,
        n: usize,
    ) -> Result<Vec<[Block; 2]>, Error> {
        let delta = self.delta()?;
        let random_keys: Vec<Block> = (0..n)
            .map(|_| {
                let k0 = self.dealer.random();
                // the receiver's random choice bit, only drawn to stay in sync
                let _: bool = self.dealer.random();
                k0
            })
            .collect();
        let d: Vec<u8> = recv_from(channel, peer, "cot choices").await?;
        let d = unpack_bits(&d, n).ok_or(Error::InvalidChoiceBits { expected: n })?;
        self.calls += 1;
        self.ots += n;
        debug!(n, "sent correlated OTs");
        Ok(random_keys
            .into_iter()
            .zip(d)
            .map(|(k0, d)| {
                let k0 = k0 ^ delta.const_mul(d);
                [k0, k0 ^ delta]
            })
            .collect())
    }
}

/// Receiver half of the ideal COT.
#[derive(Debug)]
pub struct IdealCotReceiver {
    dealer: ChaCha20Rng,
    delta: Option<Block>,
    calls: usize,
    last_choices: Vec<bool>,
}

impl IdealCotReceiver {
    /// Creates a receiver with the dealer identified by `label`.
    pub fn new(label: &[u8]) -> Self {
        Self {
            dealer: dealer(label),
            delta: None,
            calls: 0,
            last_choices: vec![],
        }
    }

    /// Number of [`CotReceiver::receive`] calls so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// The choice bits of the last [`CotReceiver::receive`] call.
    pub fn last_choices(&self) -> &[bool] {
        &self.last_choices
    }
}

impl CotReceiver for IdealCotReceiver {
    #[instrument(level = Level::DEBUG, skip_all, err)]
    async fn init(&mut self, _channel: &impl Channel, _peer: usize) -> Result<(), Error> {
        self.delta = Some(self.dealer.random());
        Ok(())
    }

    async fn receive(
        &mut self,
        channel: &impl Channel,
        peer: usize,
        choices: &[bool],
    ) -> Result<Vec<Block>, Error> {
        let delta = self.delta.ok_or(Error::NotInitialized)?;
        let mut keys = Vec::with_capacity(choices.len());
        let mut d = Vec::with_capacity(choices.len());
        for c in choices {
            let k0: Block = self.dealer.random();
            let r: bool = self.dealer.random();
            keys.push(k0 ^ delta.const_mul(r));
            d.push(r ^ c);
        }
        send_to(channel, peer, "cot choices", &pack_bits(&d)).await?;
        self.calls += 1;
        self.last_choices = choices.to_vec();
        debug!(n = choices.len(), "received correlated OTs");
        Ok(keys)
    }
}

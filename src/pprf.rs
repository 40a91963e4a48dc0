//! Punctured-PRF sessions.
//!
//! A [`PprfSender`] and a [`PprfReceiver`] each hold their half of a correlated
//! OT and the [`PprfConfig`]. Every call of `puncture` runs a batch of
//! independent trees against one COT batch:
//!
//! 1. Both parties check their arguments. Nothing is sent if they are invalid.
//! 2. One COT per tree level; the receiver chooses the complement of its path.
//! 3. The sender expands all trees and sends one correction message for the
//!    whole batch.
//! 4. The receiver rebuilds every leaf except the punctured one.
//!
//! A batch either succeeds for every tree or fails as a whole.
use rayon::prelude::*;
use tracing::{Level, debug, instrument, trace};

use crate::{
    block::Block,
    channel::{self, Channel, ErrorKind, send_to},
    config::{MAX_HEIGHT, PprfConfig, Variant},
    cot::{self, CotReceiver, CotSender},
    crypto::Primitives,
    error::{Abort, Error, Precondition},
    ggm::{
        Leaf, LevelInspector,
        builder::{self, Expansion},
        choice_bits, reconstruct, tree_height,
    },
};

mod half_tree;
mod naive;

const CORRECTIONS_PHASE: &str = "pprf corrections";

/// Called with `(tree, level, nodes)` for every level of every tree the sender
/// expands. Meant for debugging and tests.
pub type TreeInspector = dyn Fn(usize, usize, &[Block]) + Send + Sync;

/// Leaves of one tree as known to the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderTree {
    /// The root the tree was expanded from.
    pub root: Block,
    /// All `each_num` leaves.
    pub leaves: Vec<Block>,
}

/// Result of [`PprfSender::puncture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderOutput {
    /// Leaves per tree.
    pub each_num: usize,
    /// One entry per tree of the batch.
    pub trees: Vec<SenderTree>,
    /// The COT offset if every tree is rooted at it.
    pub delta: Option<Block>,
}

/// Leaves of one tree as known to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverTree {
    /// The punctured position.
    pub alpha: usize,
    /// All `each_num` leaves, [`Leaf::Punctured`] at `alpha`.
    pub leaves: Vec<Leaf>,
    /// XOR of all known leaves of the uncropped last level, if the tree is rooted at Δ.
    pub(crate) complement_sum: Option<Block>,
}

impl ReceiverTree {
    /// `v_α ⊕ Δ` for the sender's punctured leaf `v_α`, if the tree is rooted at Δ.
    ///
    /// For a single-leaf tree this is the chosen COT key.
    pub fn complement_sum(&self) -> Option<Block> {
        self.complement_sum
    }
}

/// Result of [`PprfReceiver::puncture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverOutput {
    /// Leaves per tree.
    pub each_num: usize,
    /// One entry per tree of the batch, in the order of the puncture indices.
    pub trees: Vec<ReceiverTree>,
}

/// The sending party: learns every leaf of every tree.
pub struct PprfSender<C> {
    cot: C,
    peer: usize,
    config: PprfConfig,
    primitives: Primitives,
    /// Global index of the next COT, used as hash tweak.
    cot_index: usize,
    initialized: bool,
    inspector: Option<Box<TreeInspector>>,
}

impl<C: CotSender> PprfSender<C> {
    /// Creates a session talking to `peer`. Call [`PprfSender::init`] before puncturing.
    pub fn new(cot: C, peer: usize, config: PprfConfig) -> Self {
        Self {
            cot,
            peer,
            config,
            primitives: Primitives::new(config.variant),
            cot_index: 0,
            initialized: false,
            inspector: None,
        }
    }

    /// Calls `inspector` with every level of every tree expanded from now on.
    pub fn with_level_inspector(
        mut self,
        inspector: impl Fn(usize, usize, &[Block]) + Send + Sync + 'static,
    ) -> Self {
        self.inspector = Some(Box::new(inspector));
        self
    }

    /// The session config.
    pub fn config(&self) -> &PprfConfig {
        &self.config
    }

    /// The underlying COT sender.
    pub fn cot(&self) -> &C {
        &self.cot
    }

    /// The COT offset Δ.
    pub fn delta(&self) -> Result<Block, Error> {
        Ok(self.cot.delta()?)
    }

    /// Validates the config and initializes the COT.
    #[instrument(level = Level::DEBUG, skip_all, err)]
    pub async fn init(&mut self, channel: &impl Channel) -> Result<(), Error> {
        self.config.validate()?;
        self.cot.init(channel, self.peer).await?;
        self.initialized = true;
        debug!(config = ?self.config, "pprf sender initialized");
        Ok(())
    }

    /// Expands `batch_num` trees of `each_num` leaves and lets the receiver
    /// learn all of them but one leaf per tree.
    #[instrument(level = Level::DEBUG, skip_all, fields(batch_num = batch_num, each_num = each_num), err)]
    pub async fn puncture(
        &mut self,
        channel: &impl Channel,
        batch_num: usize,
        each_num: usize,
    ) -> Result<SenderOutput, Error> {
        check_shape(self.initialized, &self.config, batch_num, each_num)?;
        let height = tree_height(each_num);
        let ots_per_tree = height.max(1);
        let delta = self.cot.delta()?;
        debug!(height, "puncture begin");

        let pairs = cot::send_pairs(&mut self.cot, channel, self.peer, batch_num * ots_per_tree)
            .await?;
        let correlated = self.config.is_correlated().then_some(delta);
        if self.config.variant == Variant::HalfTree || (height == 0 && correlated.is_some()) {
            cot::check_correlation(&pairs, delta)?;
        }
        let tweak_offset = self.cot_index;
        self.cot_index += pairs.len();
        debug!(ots = pairs.len(), "correlated OTs done");

        if height == 0 {
            // a single Δ-rooted leaf is the COT key k₀, the receiver's chosen
            // key k₀ ⊕ Δ stands in for its complement sum
            debug!("degenerate trees, no corrections");
            let trees = pairs
                .iter()
                .map(|[k0, _]| match correlated {
                    Some(delta) => SenderTree {
                        root: delta,
                        leaves: vec![*k0],
                    },
                    None => {
                        let root = rand::random();
                        SenderTree {
                            root,
                            leaves: vec![root],
                        }
                    }
                })
                .collect();
            return Ok(SenderOutput {
                each_num,
                trees,
                delta: correlated,
            });
        }

        let variant = self.config.variant;
        // level 1 of every tree, its XOR is the root
        let level1: Vec<[Block; 2]> = match (variant, correlated) {
            (Variant::HalfTree, _) => pairs.iter().step_by(height).copied().collect(),
            (Variant::Naive, Some(delta)) => (0..batch_num)
                .map(|_| {
                    let left: Block = rand::random();
                    [left, left ^ delta]
                })
                .collect(),
            (Variant::Naive, None) => (0..batch_num)
                .map(|_| self.primitives.expander.children(rand::random()))
                .collect(),
        };

        let parallel = self.config.parallel;
        let expander = &self.primitives.expander;
        let inspector = self.inspector.as_deref();
        let trees: Vec<Expansion> = map_trees(batch_num, parallel, |tree| {
            let inspect = inspector
                .map(|f| move |level: usize, nodes: &[Block]| f(tree, level, nodes));
            builder::build(
                level1[tree],
                height,
                expander,
                parallel,
                inspect.as_ref().map(|f| f as &LevelInspector<'_>),
            )
        });
        trace!(trees = trees.len(), "trees expanded");

        let corrections = match variant {
            Variant::Naive => {
                naive::corrections(&trees, &pairs, &self.primitives.key_hash, tweak_offset)
            }
            Variant::HalfTree => half_tree::corrections(&trees, &pairs, height),
        };
        drop(pairs);
        send_to(channel, self.peer, CORRECTIONS_PHASE, &corrections).await?;
        debug!(blocks = corrections.len(), "corrections sent");

        let trees = trees
            .into_iter()
            .zip(level1)
            .map(|(mut tree, [left, right])| {
                tree.leaves.truncate(each_num);
                SenderTree {
                    root: left ^ right,
                    leaves: tree.leaves,
                }
            })
            .collect();
        Ok(SenderOutput {
            each_num,
            trees,
            delta: correlated,
        })
    }
}

/// The receiving party: learns every leaf except one chosen position per tree.
pub struct PprfReceiver<C> {
    cot: C,
    peer: usize,
    config: PprfConfig,
    primitives: Primitives,
    cot_index: usize,
    initialized: bool,
}

impl<C: CotReceiver> PprfReceiver<C> {
    /// Creates a session talking to `peer`. Call [`PprfReceiver::init`] before puncturing.
    pub fn new(cot: C, peer: usize, config: PprfConfig) -> Self {
        Self {
            cot,
            peer,
            config,
            primitives: Primitives::new(config.variant),
            cot_index: 0,
            initialized: false,
        }
    }

    /// The session config.
    pub fn config(&self) -> &PprfConfig {
        &self.config
    }

    /// The underlying COT receiver.
    pub fn cot(&self) -> &C {
        &self.cot
    }

    /// Validates the config and initializes the COT.
    #[instrument(level = Level::DEBUG, skip_all, err)]
    pub async fn init(&mut self, channel: &impl Channel) -> Result<(), Error> {
        self.config.validate()?;
        self.cot.init(channel, self.peer).await?;
        self.initialized = true;
        debug!(config = ?self.config, "pprf receiver initialized");
        Ok(())
    }

    /// Learns all leaves of `batch_num` trees of `each_num` leaves except the
    /// leaf `alphas[t]` of tree `t`.
    #[instrument(level = Level::DEBUG, skip_all, fields(batch_num = batch_num, each_num = each_num), err)]
    pub async fn puncture(
        &mut self,
        channel: &impl Channel,
        batch_num: usize,
        each_num: usize,
        alphas: &[usize],
    ) -> Result<ReceiverOutput, Error> {
        check_shape(self.initialized, &self.config, batch_num, each_num)?;
        if alphas.len() != batch_num {
            return Err(Precondition::AlphaCount {
                expected: batch_num,
                actual: alphas.len(),
            }
            .into());
        }
        if let Some((tree, &alpha)) = alphas.iter().enumerate().find(|(_, a)| **a >= each_num) {
            return Err(Precondition::AlphaOutOfRange {
                tree,
                alpha,
                each_num,
            }
            .into());
        }
        let height = tree_height(each_num);
        debug!(height, "puncture begin");

        let choices: Vec<bool> = if height == 0 {
            vec![true; batch_num]
        } else {
            alphas
                .iter()
                .flat_map(|alpha| choice_bits(*alpha, height))
                .collect()
        };
        let keys = cot::receive_keys(&mut self.cot, channel, self.peer, &choices).await?;
        let tweak_offset = self.cot_index;
        self.cot_index += keys.len();
        debug!(ots = keys.len(), "correlated OTs done");

        let correlated = self.config.is_correlated();
        if height == 0 {
            debug!("degenerate trees, no corrections");
            return Ok(ReceiverOutput {
                each_num,
                trees: alphas
                    .iter()
                    .zip(keys)
                    .map(|(&alpha, key)| ReceiverTree {
                        alpha,
                        leaves: vec![Leaf::Punctured],
                        complement_sum: correlated.then_some(key),
                    })
                    .collect(),
            });
        }

        let variant = self.config.variant;
        let expected = match variant {
            Variant::Naive => naive::correction_len(batch_num, height),
            Variant::HalfTree => half_tree::correction_len(batch_num, height),
        };
        let corrections = recv_corrections(channel, self.peer, expected).await?;
        debug!(blocks = corrections.len(), "corrections received");

        let sibling_sums = match variant {
            Variant::Naive => naive::sibling_sums(
                &corrections,
                &keys,
                &choices,
                &self.primitives.key_hash,
                tweak_offset,
            ),
            Variant::HalfTree => half_tree::sibling_sums(&corrections, &keys, height),
        };
        drop(keys);
        drop(corrections);

        let parallel = self.config.parallel;
        let expander = &self.primitives.expander;
        let trees = map_trees(batch_num, parallel, |tree| {
            let sums = &sibling_sums[tree * height..(tree + 1) * height];
            let punctured = reconstruct::reconstruct(alphas[tree], height, sums, expander, parallel);
            ReceiverTree {
                alpha: alphas[tree],
                leaves: punctured.crop(each_num),
                complement_sum: correlated.then(|| punctured.complement_sum()),
            }
        });
        debug!(trees = trees.len(), "leaves extracted");
        Ok(ReceiverOutput { each_num, trees })
    }
}

/// Checks the arguments shared by both parties.
fn check_shape(
    initialized: bool,
    config: &PprfConfig,
    batch_num: usize,
    each_num: usize,
) -> Result<(), Error> {
    if !initialized {
        return Err(Precondition::NotInitialized.into());
    }
    config.validate()?;
    if batch_num == 0 {
        return Err(Precondition::EmptyBatch.into());
    }
    if each_num == 0 {
        return Err(Precondition::EmptyTree.into());
    }
    let max_leaves = 1_usize.checked_shl(MAX_HEIGHT as u32).unwrap_or(usize::MAX);
    if each_num > max_leaves {
        return Err(Precondition::TreeTooLarge { each_num }.into());
    }
    Ok(())
}

/// Receives the correction message, a payload of the wrong size aborts.
async fn recv_corrections(
    channel: &impl Channel,
    peer: usize,
    expected: usize,
) -> Result<Vec<Block>, Error> {
    channel::recv_vec_from(channel, peer, CORRECTIONS_PHASE, expected)
        .await
        .map_err(|e| match e.reason {
            ErrorKind::InvalidLength { expected, actual } => {
                Abort::CorrectionLength { expected, actual }.into()
            }
            _ => Error::Channel(e),
        })
}

fn map_trees<T: Send>(
    batch_num: usize,
    parallel: bool,
    f: impl Fn(usize) -> T + Send + Sync,
) -> Vec<T> {
    if parallel {
        (0..batch_num).into_par_iter().map(f).collect()
    } else {
        (0..batch_num).map(f).collect()
    }
}

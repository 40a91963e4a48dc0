//! A distributed punctured pseudorandom function (DPPRF) from GGM trees.
//!
//! Two parties expand a batch of binary trees of pseudorandom 128-bit
//! [`Block`]s. The sender learns every leaf of every tree. The receiver picks a
//! private position `α` per tree and learns every leaf except the one at `α`,
//! while the sender learns nothing about `α`. This is the core of single-point
//! and multi-point correlated OT (see [`spcot`]) as used in silent OT and
//! triple generation.
//!
//! ## Main Components
//!
//! * [`PprfSender`] / [`PprfReceiver`]: the two sessions running
//!   [`puncture`](PprfSender::puncture) over a [`channel::Channel`].
//! * [`PprfConfig`]: selects the level protocol, see [`config::Variant`]:
//!   the naive protocol sending two corrections per level, or the half-tree
//!   protocol sending one correction per level.
//! * [`cot`]: the correlated OT consumed by the sessions, with a
//!   dealer-simulated [`cot::ideal`] implementation for testing.
//! * [`ggm`]: the tree data model, e.g. the [`Leaf`] type.
//!
//! ## Example
//!
//! ```
//! use ggm_dpprf::{
//!     PprfConfig, PprfReceiver, PprfSender, channel::SimpleChannel, cot::ideal::ideal_cot,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ggm_dpprf::Error> {
//! let channels = SimpleChannel::channels(2);
//! let (cot_sender, cot_receiver) = ideal_cot(b"doc example");
//! let config = PprfConfig::half_tree();
//! let mut sender = PprfSender::new(cot_sender, 1, config);
//! let mut receiver = PprfReceiver::new(cot_receiver, 0, config);
//! tokio::try_join!(sender.init(&channels[0]), receiver.init(&channels[1]))?;
//!
//! let (sent, received) = tokio::try_join!(
//!     sender.puncture(&channels[0], 2, 8),
//!     receiver.puncture(&channels[1], 2, 8, &[5, 0]),
//! )?;
//! assert_eq!(None, received.trees[0].leaves[5].value());
//! assert_eq!(Some(sent.trees[0].leaves[4]), received.trees[0].leaves[4].value());
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! Both level protocols are secure against semi-honest adversaries given a
//! secure correlated OT. The [`cot::ideal`] OT is not secure.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod block;
pub mod channel;
pub mod config;
pub mod cot;
pub mod error;
pub mod ggm;
pub mod pprf;
pub mod spcot;

mod crypto;
mod utils;

pub use block::Block;
pub use config::PprfConfig;
pub use error::Error;
pub use ggm::Leaf;
pub use pprf::{PprfReceiver, PprfSender, ReceiverOutput, SenderOutput};

//! Configuration of a punctured-PRF session.
//!
//! A [`PprfConfig`] is an immutable value handed to
//! [`PprfSender::new`](crate::PprfSender::new) and
//! [`PprfReceiver::new`](crate::PprfReceiver::new). Both parties must use the same
//! [`Variant`]; the other fields only influence local behavior.
use serde::{Deserialize, Serialize};

use crate::{
    block::Block,
    cot::{OtRole, PprfRole},
    error::{Error, Precondition},
};

/// The security parameter K in bits, i.e. the width of every tree node.
pub const SECURITY_BITS: usize = Block::BITS;

/// Largest supported tree height, limiting `each_num` to `2^MAX_HEIGHT`.
pub const MAX_HEIGHT: usize = 32;

/// Levels with fewer parents than this are expanded on the calling thread even
/// when [`PprfConfig::parallel`] is set.
pub(crate) const PAR_LEVEL_THRESHOLD: usize = 1 << 10;

/// The level protocol used to transfer the sibling sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Semi-honest GGM protocol: two corrections per level, each masked with a
    /// hash of one OT key.
    Naive,
    /// Half-tree protocol: the COT pair is the first level and a single
    /// correction per deeper level suffices. Nodes are expanded with a
    /// circular correlation robust hash.
    HalfTree,
}

/// How the sender chooses the root of each tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMode {
    /// A fresh random root per tree.
    Random,
    /// The global COT offset Δ is the root of every tree, so every full
    /// level of every tree XORs to Δ.
    Delta,
}

/// Which OT role each punctured-PRF party plays in the correlated OT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtRoleMapping {
    /// The OT role of the punctured-PRF sender. The receiver plays the other one.
    pub pprf_sender: OtRole,
}

impl OtRoleMapping {
    /// The punctured-PRF sender is also the OT sender.
    pub const DIRECT: Self = Self {
        pprf_sender: OtRole::Sender,
    };

    /// The OT role played by `party`.
    pub fn ot_role(&self, party: PprfRole) -> OtRole {
        match party {
            PprfRole::Sender => self.pprf_sender,
            PprfRole::Receiver => self.pprf_sender.other(),
        }
    }
}

impl Default for OtRoleMapping {
    fn default() -> Self {
        Self::DIRECT
    }
}

/// Configuration of a punctured-PRF session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PprfConfig {
    /// The level protocol.
    pub variant: Variant,
    /// Root choice of the sender. [`Variant::HalfTree`] requires [`RootMode::Delta`].
    pub root: RootMode,
    /// Expand independent trees and large levels on the rayon thread pool.
    pub parallel: bool,
    /// OT role bookkeeping, see [`OtRoleMapping`].
    #[serde(default)]
    pub ot_roles: OtRoleMapping,
}

impl PprfConfig {
    /// Naive two-corrections-per-level protocol with random roots.
    pub fn naive() -> Self {
        Self {
            variant: Variant::Naive,
            root: RootMode::Random,
            parallel: true,
            ot_roles: OtRoleMapping::DIRECT,
        }
    }

    /// Half-tree protocol. The root of every tree is Δ.
    pub fn half_tree() -> Self {
        Self {
            variant: Variant::HalfTree,
            root: RootMode::Delta,
            parallel: true,
            ot_roles: OtRoleMapping::DIRECT,
        }
    }

    /// Returns the config with the given root mode.
    pub fn with_root(self, root: RootMode) -> Self {
        Self { root, ..self }
    }

    /// Returns the config with parallel expansion enabled or disabled.
    pub fn with_parallel(self, parallel: bool) -> Self {
        Self { parallel, ..self }
    }

    /// Returns the config with the given OT role mapping.
    pub fn with_ot_roles(self, ot_roles: OtRoleMapping) -> Self {
        Self { ot_roles, ..self }
    }

    /// Checks that the combination of settings is supported.
    pub fn validate(&self) -> Result<(), Error> {
        if self.variant == Variant::HalfTree && self.root != RootMode::Delta {
            return Err(Precondition::HalfTreeNeedsDelta.into());
        }
        // Both level protocols mask the corrections with keys only the OT
        // sender knows in full.
        if self.ot_roles != OtRoleMapping::DIRECT {
            return Err(Precondition::RoleMapping {
                pprf_sender: self.ot_roles.pprf_sender,
            }
            .into());
        }
        Ok(())
    }

    /// Whether every tree built under this config is rooted at Δ.
    pub fn is_correlated(&self) -> bool {
        self.root == RootMode::Delta
    }
}

impl Default for PprfConfig {
    fn default() -> Self {
        Self::half_tree()
    }
}

//! Feature-id partitioning.
//!
//! Every rank computes the same mapping independently; no coordination
//! message is exchanged to agree on ownership.

use crate::types::{FeatureId, Rank};

/// Ownership rule for feature id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroIdPolicy {
    /// `owner(0) = 0 mod N = 0`, the plain modulo rule.
    #[default]
    Canonical,
    /// Route id 0 to rank `N`, which is outside `[0, N)`. No rank ever owns
    /// it, so id 0 is dropped from the join. Kept only for output
    /// compatibility with older runs.
    Legacy,
}

/// Maps a feature id to `(owner rank, local slot)`.
///
/// `owner(id) = id mod N`, `local_slot(id) = id div N`. For a fixed owner the
/// slot is unique per id, so each rank's dictionary is collision-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    world_size: u32,
    zero_id: ZeroIdPolicy,
}

impl Partitioner {
    /// `world_size` must be non-zero; [`NodeContext`](crate::types::NodeContext)
    /// enforces that before any partitioner is built from it.
    pub fn new(world_size: u32, zero_id: ZeroIdPolicy) -> Self {
        debug_assert!(world_size > 0);
        Self {
            world_size,
            zero_id,
        }
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn zero_id(&self) -> ZeroIdPolicy {
        self.zero_id
    }

    /// Owning rank of `id`. Only returns `world_size` (out of range) for id 0
    /// under [`ZeroIdPolicy::Legacy`].
    pub fn owner(&self, id: FeatureId) -> Rank {
        if id == 0 && self.zero_id == ZeroIdPolicy::Legacy {
            return self.world_size;
        }
        (id % self.world_size as u64) as Rank
    }

    /// Dictionary slot of `id` on its owning rank.
    pub fn local_slot(&self, id: FeatureId) -> u64 {
        id / self.world_size as u64
    }

    pub fn is_owned_by(&self, id: FeatureId, rank: Rank) -> bool {
        self.owner(id) == rank
    }
}

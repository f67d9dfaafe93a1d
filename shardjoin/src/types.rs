use crate::error::{Result, ShardJoinError};

/// Rank of a participant in the group (0-indexed).
pub type Rank = u32;

/// Feature identifier, the join key shared by both datasets.
pub type FeatureId = u64;

/// Message tag used to demultiplex point-to-point traffic.
pub type Tag = u64;

/// Identity of this process within a fixed-size group.
///
/// Passed explicitly into every component; nothing reads rank or group size
/// from ambient process state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeContext {
    rank: Rank,
    world_size: u32,
}

impl NodeContext {
    /// Validate and build a context. Fails if `world_size == 0` or
    /// `rank >= world_size`.
    pub fn new(rank: Rank, world_size: u32) -> Result<Self> {
        if world_size == 0 {
            return Err(ShardJoinError::EmptyGroup);
        }
        if rank >= world_size {
            return Err(ShardJoinError::InvalidRank { rank, world_size });
        }
        Ok(Self { rank, world_size })
    }

    /// This process's rank.
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Total number of ranks in the group.
    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Check that `rank` names a member of this group.
    pub fn check_rank(&self, rank: Rank) -> Result<()> {
        if rank >= self.world_size {
            return Err(ShardJoinError::InvalidRank {
                rank,
                world_size: self.world_size,
            });
        }
        Ok(())
    }
}

/// Tag pair a sender uses for its frames: one tag for the length-carrying
/// control message, one for the payload bytes.
///
/// Derived from the sender's rank as `(10·r + 1, 10·r + 2)`, so a receiver
/// can demultiplex streams from different ranks on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameTags {
    pub control: Tag,
    pub payload: Tag,
}

impl FrameTags {
    pub const fn for_rank(rank: Rank) -> Self {
        let base = rank as Tag * 10;
        Self {
            control: base + 1,
            payload: base + 2,
        }
    }
}

use crate::types::{FeatureId, Rank};
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, ShardJoinError>;

#[derive(Debug, thiserror::Error)]
pub enum ShardJoinError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} line {line}: {reason}: {content:?}", path.display())]
    Format {
        path: PathBuf,
        line: u64,
        content: String,
        reason: &'static str,
    },

    #[error(
        "{} line {line}: feature {feature_id} is owned by this rank but missing from the local dictionary",
        path.display()
    )]
    PartitionInconsistency {
        path: PathBuf,
        line: u64,
        feature_id: FeatureId,
    },

    #[error("protocol violation from rank {rank}: {reason}")]
    Protocol { rank: Rank, reason: String },

    #[error("receive from rank {rank} timed out after {timeout_ms}ms")]
    Timeout { rank: Rank, timeout_ms: u64 },

    #[error("peer {rank} disconnected unexpectedly")]
    PeerDisconnected { rank: Rank },

    #[error("rank {rank} not found in group")]
    UnknownPeer { rank: Rank },

    #[error("invalid rank {rank}: world size is {world_size}")]
    InvalidRank { rank: Rank, world_size: u32 },

    #[error("group size must be at least 1")]
    EmptyGroup,

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ShardJoinError {
    /// Wrap an I/O failure on `path`.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a `Format` error for a 1-based line of `path`.
    pub fn format(
        path: impl AsRef<Path>,
        line: u64,
        content: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::Format {
            path: path.as_ref().to_path_buf(),
            line,
            content: content.into(),
            reason,
        }
    }

    /// Create a `Protocol` error attributed to `rank`.
    pub fn protocol(rank: Rank, reason: impl Into<String>) -> Self {
        Self::Protocol {
            rank,
            reason: reason.into(),
        }
    }

    /// Create a `Transport` error with just a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a `Transport` error with a message and a source error.
    pub fn transport_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The 1-based line number for parse-level failures.
    pub fn line(&self) -> Option<u64> {
        match self {
            Self::Format { line, .. } | Self::PartitionInconsistency { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Map a component result onto the two-valued process status: 0 or 1.
pub fn exit_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

//! Runtime-configurable parameters for shardjoin.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `SHARDJOIN_`) or by constructing a custom `ShardJoinConfig`.

use crate::error::{Result, ShardJoinError};
use crate::partition::ZeroIdPolicy;
use crate::types::Rank;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Tuning and protocol parameters shared by every rank of a run.
#[derive(Debug, Clone)]
pub struct ShardJoinConfig {
    /// Lines accumulated by a sender before a chunk is emitted.
    pub lines_per_chunk: usize,

    /// The collector flushes the final file after at most this many bytes.
    pub flush_bytes: usize,

    /// Upper bound on a single receive at the collector, once the sender
    /// has started streaming.
    pub recv_timeout: Duration,

    /// Upper bound on the collector's wait for a sender's first frame. That
    /// frame is only sent after the sender's dictionary build and join, so
    /// this must cover the slowest rank's join time.
    pub first_recv_timeout: Duration,

    /// Timeout for forming TCP connections between senders and collector.
    pub connect_timeout: Duration,

    /// Frames announcing more than this many payload bytes are rejected.
    pub max_frame_bytes: usize,

    /// Ownership rule for feature id 0.
    pub zero_id: ZeroIdPolicy,

    /// Rank that gathers every partial file into the final output.
    pub collector_rank: Rank,
}

impl Default for ShardJoinConfig {
    fn default() -> Self {
        Self {
            lines_per_chunk: 5000,
            flush_bytes: 10_000,
            recv_timeout: Duration::from_secs(300),
            first_recv_timeout: Duration::from_secs(6 * 3600),
            connect_timeout: Duration::from_secs(60),
            max_frame_bytes: 1024 * 1024 * 1024, // 1 GiB
            zero_id: ZeroIdPolicy::Canonical,
            collector_rank: 0,
        }
    }
}

impl ShardJoinConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `SHARDJOIN_LINES_PER_CHUNK`
    /// - `SHARDJOIN_FLUSH_BYTES`
    /// - `SHARDJOIN_RECV_TIMEOUT_SECS`
    /// - `SHARDJOIN_FIRST_RECV_TIMEOUT_SECS`
    /// - `SHARDJOIN_CONNECT_TIMEOUT_SECS`
    /// - `SHARDJOIN_MAX_FRAME_BYTES`
    /// - `SHARDJOIN_LEGACY_ZERO_ID`
    /// - `SHARDJOIN_COLLECTOR_RANK`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>("SHARDJOIN_LINES_PER_CHUNK")
            && n > 0
        {
            cfg.lines_per_chunk = n;
        }
        if let Some(n) = env_parse::<usize>("SHARDJOIN_FLUSH_BYTES")
            && n > 0
        {
            cfg.flush_bytes = n;
        }
        if let Some(s) = env_parse::<u64>("SHARDJOIN_RECV_TIMEOUT_SECS") {
            cfg.recv_timeout = Duration::from_secs(s);
        }
        if let Some(s) = env_parse::<u64>("SHARDJOIN_FIRST_RECV_TIMEOUT_SECS") {
            cfg.first_recv_timeout = Duration::from_secs(s);
        }
        if let Some(s) = env_parse::<u64>("SHARDJOIN_CONNECT_TIMEOUT_SECS") {
            cfg.connect_timeout = Duration::from_secs(s);
        }
        if let Some(n) = env_parse::<usize>("SHARDJOIN_MAX_FRAME_BYTES") {
            cfg.max_frame_bytes = n;
        }
        if let Ok(v) = std::env::var("SHARDJOIN_LEGACY_ZERO_ID")
            && parse_flag(&v)
        {
            cfg.zero_id = ZeroIdPolicy::Legacy;
        }
        if let Some(r) = env_parse::<Rank>("SHARDJOIN_COLLECTOR_RANK") {
            cfg.collector_rank = r;
        }

        cfg
    }
}

/// Per-process settings for the node binary: topology, peer address and
/// file locations. Unlike [`ShardJoinConfig`], every field is required.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub rank: Rank,
    pub world_size: u32,
    /// Address the collector listens on; senders connect to it.
    pub collector_addr: SocketAddr,
    /// Weight-feature dataset.
    pub weights: PathBuf,
    /// Feature-origin dataset.
    pub features: PathBuf,
    /// Base name for per-rank partial files (`<base>_<rank>`).
    pub partial_base: PathBuf,
    /// Final merged file, written by the collector only.
    pub output: PathBuf,
}

impl NodeSettings {
    /// Read settings from the environment.
    ///
    /// Required variables:
    /// - `SHARDJOIN_RANK`
    /// - `SHARDJOIN_WORLD_SIZE`
    /// - `SHARDJOIN_COLLECTOR_ADDR`
    /// - `SHARDJOIN_WEIGHTS`
    /// - `SHARDJOIN_FEATURES`
    /// - `SHARDJOIN_PARTIAL_BASE`
    /// - `SHARDJOIN_OUTPUT`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rank: env_required("SHARDJOIN_RANK")?,
            world_size: env_required("SHARDJOIN_WORLD_SIZE")?,
            collector_addr: env_required("SHARDJOIN_COLLECTOR_ADDR")?,
            weights: env_required::<String>("SHARDJOIN_WEIGHTS")?.into(),
            features: env_required::<String>("SHARDJOIN_FEATURES")?.into(),
            partial_base: env_required::<String>("SHARDJOIN_PARTIAL_BASE")?.into(),
            output: env_required::<String>("SHARDJOIN_OUTPUT")?.into(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn env_required<T: std::str::FromStr>(key: &str) -> Result<T> {
    let raw = std::env::var(key).map_err(|_| ShardJoinError::Config(format!("{key} is not set")))?;
    raw.trim()
        .parse()
        .map_err(|_| ShardJoinError::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

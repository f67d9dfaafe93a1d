//! Distributed hash join with streaming result collection.
//!
//! Every rank of a fixed-size group reads the same two datasets, keeps only
//! the features it owns (`id mod N`), joins its share of the weight records
//! into a per-rank partial file, and streams that file to one collector rank
//! which merges all partials into a single output.

pub mod config;
pub mod dictionary;
pub mod error;
pub mod join;
pub mod node;
pub mod partition;
pub mod protocol;
pub mod stream;
pub mod transport;
pub mod types;

pub use config::{NodeSettings, ShardJoinConfig};
pub use dictionary::LocalDictionary;
pub use error::{Result, ShardJoinError, exit_code};
pub use join::{JoinEngine, JoinStats, WeightRecord, partial_path};
pub use node::{JobPaths, NodeReport, RoleReport, run_join, run_local, run_node};
pub use partition::{Partitioner, ZeroIdPolicy};
pub use protocol::{Frame, FrameHeader};
pub use stream::{CollectStats, CollectorState, SendStats, SenderState, StreamCollector, StreamSender};
pub use transport::{LocalTransport, TaggedTransport, TcpTransport, tcp_listen};
pub use types::{FeatureId, FrameTags, NodeContext, Rank, Tag};

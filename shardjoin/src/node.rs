//! One rank's end-to-end run: build the dictionary, join, then either stream
//! the partial file to the collector or gather everyone's output.

use crate::config::ShardJoinConfig;
use crate::dictionary::LocalDictionary;
use crate::error::{Result, ShardJoinError};
use crate::join::{JoinEngine, JoinStats, partial_path};
use crate::partition::Partitioner;
use crate::stream::{CollectStats, SendStats, StreamCollector, StreamSender};
use crate::transport::{LocalTransport, TaggedTransport};
use crate::types::{NodeContext, Rank};
use std::path::PathBuf;

/// Dataset and output locations, identical on every rank.
#[derive(Debug, Clone)]
pub struct JobPaths {
    /// Weight-feature dataset.
    pub weights: PathBuf,
    /// Feature-origin dataset.
    pub features: PathBuf,
    /// Base name of partial files; rank `r` writes `<base>_<r>`.
    pub partial_base: PathBuf,
    /// Final merged file on the collector.
    pub output: PathBuf,
}

/// What this rank did after the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleReport {
    Sent(SendStats),
    Collected(CollectStats),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub rank: Rank,
    pub join: JoinStats,
    pub role: RoleReport,
}

/// Build the local dictionary and run the join for `ctx.rank()`.
///
/// Runs on the blocking pool; the scan is synchronous file I/O.
pub async fn run_join(
    ctx: NodeContext,
    config: &ShardJoinConfig,
    paths: &JobPaths,
) -> Result<JoinStats> {
    let partitioner = Partitioner::new(ctx.world_size(), config.zero_id);
    let features = paths.features.clone();
    let weights = paths.weights.clone();
    let base = paths.partial_base.clone();

    tokio::task::spawn_blocking(move || {
        let dict = LocalDictionary::build(&features, &ctx, &partitioner)?;
        JoinEngine::new(ctx, partitioner, &dict).run(&weights, &base)
    })
    .await
    .map_err(|e| ShardJoinError::transport_with_source("join task panicked", e))?
}

/// Run the full pipeline for the rank owning `transport`.
pub async fn run_node<T>(transport: &T, config: &ShardJoinConfig, paths: &JobPaths) -> Result<NodeReport>
where
    T: TaggedTransport + ?Sized,
{
    let ctx = NodeContext::new(transport.rank(), transport.world_size())?;
    ctx.check_rank(config.collector_rank)?;

    let join = run_join(ctx, config, paths).await?;
    let own_partial = partial_path(&paths.partial_base, ctx.rank());

    let role = if ctx.rank() == config.collector_rank {
        let collector = StreamCollector::new(transport, config);
        RoleReport::Collected(collector.collect(&own_partial, &paths.output).await?)
    } else {
        let sender = StreamSender::new(transport, config.collector_rank, config.lines_per_chunk);
        RoleReport::Sent(sender.send_file(&own_partial).await?)
    };

    Ok(NodeReport {
        rank: ctx.rank(),
        join,
        role,
    })
}

/// Run a whole group inside this process over [`LocalTransport`], one task
/// per rank. Returns every rank's outcome, indexed by rank.
///
/// A rank that fails drops its endpoint, so the collector reports
/// `PeerDisconnected` for it instead of waiting forever.
pub async fn run_local(
    world_size: u32,
    config: &ShardJoinConfig,
    paths: &JobPaths,
) -> Result<Vec<Result<NodeReport>>> {
    let mesh = LocalTransport::mesh(world_size)?;
    let mut handles = Vec::with_capacity(mesh.len());
    for transport in mesh {
        let config = config.clone();
        let paths = paths.clone();
        handles.push(tokio::spawn(async move {
            run_node(&transport, &config, &paths).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for h in handles {
        results.push(
            h.await
                .map_err(|e| ShardJoinError::transport_with_source("node task panicked", e))?,
        );
    }
    Ok(results)
}

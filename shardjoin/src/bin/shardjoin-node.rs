//! One rank of a distributed join over TCP.
//!
//! Topology and file locations come from `SHARDJOIN_*` environment variables
//! (see [`NodeSettings::from_env`] and [`ShardJoinConfig::from_env`]). The
//! collector rank listens on `SHARDJOIN_COLLECTOR_ADDR`; every other rank
//! connects to it.
//!
//! ```bash
//! SHARDJOIN_RANK=0 SHARDJOIN_WORLD_SIZE=3 SHARDJOIN_COLLECTOR_ADDR=127.0.0.1:7700 \
//! SHARDJOIN_WEIGHTS=weights.txt SHARDJOIN_FEATURES=features.txt \
//! SHARDJOIN_PARTIAL_BASE=out/partial SHARDJOIN_OUTPUT=out/joined.txt \
//!     cargo run --bin shardjoin-node
//! ```

use shardjoin::{
    JobPaths, NodeContext, NodeReport, NodeSettings, RoleReport, ShardJoinConfig, TcpTransport,
    exit_code, run_node, tcp_listen,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let result = run().await;
    match &result {
        Ok(report) => match &report.role {
            RoleReport::Sent(s) => tracing::info!(
                rank = report.rank,
                emitted = report.join.lines_emitted,
                frames = s.frames,
                "node finished"
            ),
            RoleReport::Collected(c) => tracing::info!(
                rank = report.rank,
                emitted = report.join.lines_emitted,
                bytes = c.own_bytes + c.bytes,
                "node finished"
            ),
        },
        Err(e) => eprintln!("shardjoin-node: {e}"),
    }
    std::process::exit(exit_code(&result));
}

async fn run() -> shardjoin::Result<NodeReport> {
    let settings = NodeSettings::from_env()?;
    let config = ShardJoinConfig::from_env();
    let ctx = NodeContext::new(settings.rank, settings.world_size)?;
    ctx.check_rank(config.collector_rank)?;

    let paths = JobPaths {
        weights: settings.weights,
        features: settings.features,
        partial_base: settings.partial_base,
        output: settings.output,
    };

    let transport = if ctx.rank() == config.collector_rank {
        let (listener, addr) = tcp_listen(settings.collector_addr).await?;
        tracing::info!(rank = ctx.rank(), %addr, "collector listening");
        TcpTransport::accept_peers(ctx, &listener, config.max_frame_bytes, config.connect_timeout)
            .await?
    } else {
        TcpTransport::connect(
            ctx,
            config.collector_rank,
            settings.collector_addr,
            config.max_frame_bytes,
            config.connect_timeout,
        )
        .await?
    };

    run_node(&transport, &config, &paths).await
}

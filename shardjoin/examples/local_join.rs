//! Join two small datasets across a 3-rank in-process group.
//!
//! Writes the inputs into a scratch directory, runs every rank as a task over
//! the local transport and prints the merged output from the collector.
//!
//! ```bash
//! cargo run --example local_join
//! ```

use shardjoin::{JobPaths, RoleReport, ShardJoinConfig, run_local};

#[tokio::main]
async fn main() -> shardjoin::Result<()> {
    let dir = std::env::temp_dir().join(format!("shardjoin-example-{}", std::process::id()));
    std::fs::create_dir_all(&dir).map_err(|e| shardjoin::ShardJoinError::io(&dir, e))?;

    let weights = dir.join("weights.txt");
    let features = dir.join("features.txt");
    write(&weights, "0.5 4\n0.2 7\n1.5 3\n0.9 5\n0.1 4\n")?;
    write(&features, "5\n3 pear\n4 apple\n5 cherry\n7 banana\n9 plum\n")?;

    let paths = JobPaths {
        weights,
        features,
        partial_base: dir.join("partial"),
        output: dir.join("joined.txt"),
    };

    for (rank, result) in run_local(3, &ShardJoinConfig::default(), &paths)
        .await?
        .into_iter()
        .enumerate()
    {
        let report = result?;
        let role = match report.role {
            RoleReport::Sent(_) => "sender",
            RoleReport::Collected(_) => "collector",
        };
        println!("rank {rank} ({role}): {} joined lines", report.join.lines_emitted);
    }

    let merged = std::fs::read_to_string(&paths.output)
        .map_err(|e| shardjoin::ShardJoinError::io(&paths.output, e))?;
    print!("{merged}");
    Ok(())
}

fn write(path: &std::path::Path, contents: &str) -> shardjoin::Result<()> {
    std::fs::write(path, contents).map_err(|e| shardjoin::ShardJoinError::io(path, e))
}

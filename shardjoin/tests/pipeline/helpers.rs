use shardjoin::{JobPaths, NodeReport, ShardJoinConfig, partial_path, run_local};
use std::path::PathBuf;
use tempfile::TempDir;

/// Scratch directory holding one job's inputs and outputs.
pub struct Job {
    _dir: TempDir,
    pub paths: JobPaths,
}

impl Job {
    pub fn new(weights: &str, features: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = JobPaths {
            weights: dir.path().join("weights.txt"),
            features: dir.path().join("features.txt"),
            partial_base: dir.path().join("partial"),
            output: dir.path().join("joined.txt"),
        };
        std::fs::write(&paths.weights, weights).unwrap();
        std::fs::write(&paths.features, features).unwrap();
        Self { _dir: dir, paths }
    }

    pub fn partial_path(&self, rank: u32) -> PathBuf {
        partial_path(&self.paths.partial_base, rank)
    }

    pub fn partial(&self, rank: u32) -> String {
        std::fs::read_to_string(self.partial_path(rank)).unwrap()
    }

    pub fn output(&self) -> String {
        std::fs::read_to_string(&self.paths.output).unwrap()
    }
}

/// Run every rank of a `world_size` group over the in-process transport and
/// return each rank's outcome, indexed by rank.
pub async fn run_group(
    world_size: u32,
    config: &ShardJoinConfig,
    job: &Job,
) -> Vec<shardjoin::Result<NodeReport>> {
    run_local(world_size, config, &job.paths).await.unwrap()
}

/// Generated datasets with the join result they must produce.
pub struct Dataset {
    pub weights: String,
    pub features: String,
    /// Expected joined lines, in weight-file order.
    pub expected: Vec<String>,
}

/// Deterministic datasets: `n_features` distinct ids (scattered, including
/// 0 for some seeds) and `n_weights` weight lines referencing them.
pub fn generate(seed: u64, n_features: u64, n_weights: usize) -> Dataset {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state >> 33
    };

    let offset = seed % 5;
    let mut feature_lines = Vec::with_capacity(n_features as usize);
    let mut features = format!("{n_features}\n");
    for i in 0..n_features {
        let id = i * 7 + offset;
        let line = format!("{id} origin-{} region{}", next() % 1000, next() % 13);
        features.push_str(&line);
        features.push('\n');
        feature_lines.push(line);
    }

    let mut weights = String::new();
    let mut expected = Vec::with_capacity(n_weights);
    for j in 0..n_weights {
        let pick = (next() % n_features) as usize;
        let id = pick as u64 * 7 + offset;
        let weight = format!("{}.{:02}", j % 10, next() % 100);
        weights.push_str(&format!("{weight} {id}\n"));
        expected.push(format!("{weight} {}", feature_lines[pick]));
    }

    Dataset {
        weights,
        features,
        expected,
    }
}

/// Feature id carried by a joined line (`<weight> <id> <origin...>`).
pub fn joined_id(line: &str) -> u64 {
    line.split_whitespace().nth(1).unwrap().parse().unwrap()
}

pub fn sorted_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
    lines.sort();
    lines
}

use super::helpers::{Job, run_group};
use shardjoin::{RoleReport, ShardJoinConfig, ShardJoinError, ZeroIdPolicy};

const WEIGHTS: &str = "0.5 4\n0.2 7\n";
const FEATURES: &str = "2\n4 apple\n7 banana\n";

#[tokio::test]
async fn test_three_node_scenario() {
    let job = Job::new(WEIGHTS, FEATURES);
    let results = run_group(3, &ShardJoinConfig::default(), &job).await;

    let reports: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(job.partial(0), "");
    assert_eq!(job.partial(1), "0.5 4 apple\n0.2 7 banana\n");
    assert_eq!(job.partial(2), "");
    assert_eq!(job.output(), "0.5 4 apple\n0.2 7 banana\n");

    assert_eq!(reports[1].join.lines_emitted, 2);
    assert_eq!(reports[0].join.lines_skipped, 2);
    match &reports[0].role {
        RoleReport::Collected(stats) => {
            assert_eq!(stats.own_bytes, 0);
            // One chunk and one end-of-stream frame from each sender.
            assert_eq!(stats.frames_per_rank.get(&1), Some(&2));
            assert_eq!(stats.frames_per_rank.get(&2), Some(&2));
        }
        other => panic!("rank 0 should collect, got {other:?}"),
    }
}

#[tokio::test]
async fn test_format_error_reports_line_one() {
    let job = Job::new("0.5\n0.2 7\n", FEATURES);
    let results = run_group(3, &ShardJoinConfig::default(), &job).await;

    for (rank, res) in results.into_iter().enumerate() {
        let err = res.unwrap_err();
        assert!(
            matches!(err, ShardJoinError::Format { line: 1, .. }),
            "rank {rank}: {err}"
        );
        assert_eq!(job.partial(rank as u32), "");
    }
    assert!(!job.paths.output.exists());
}

#[tokio::test]
async fn test_bad_dictionary_line_reports_its_line() {
    let job = Job::new(WEIGHTS, "2\n4 apple\n7\n");
    let results = run_group(2, &ShardJoinConfig::default(), &job).await;
    for res in results {
        assert_eq!(res.unwrap_err().line(), Some(3));
    }
}

#[tokio::test]
async fn test_missing_owned_entry_fails_that_rank() {
    // Feature 5 is referenced but never defined; rank 2 owns it.
    let job = Job::new("0.5 4\n0.9 5\n", "1\n4 apple\n");
    let results = run_group(3, &ShardJoinConfig::default(), &job).await;

    assert!(matches!(
        results[2],
        Err(ShardJoinError::PartitionInconsistency {
            line: 2,
            feature_id: 5,
            ..
        })
    ));
    // Rank 2 never streamed, so the collector sees it go away.
    assert!(matches!(
        results[0],
        Err(ShardJoinError::PeerDisconnected { rank: 2 })
    ));
}

#[tokio::test]
async fn test_non_default_collector() {
    let job = Job::new(WEIGHTS, FEATURES);
    let config = ShardJoinConfig {
        collector_rank: 2,
        ..ShardJoinConfig::default()
    };
    let results = run_group(3, &config, &job).await;

    assert!(matches!(results[0], Ok(ref r) if matches!(r.role, RoleReport::Sent(_))));
    assert!(matches!(results[2], Ok(ref r) if matches!(r.role, RoleReport::Collected(_))));
    assert_eq!(job.output(), "0.5 4 apple\n0.2 7 banana\n");
}

#[tokio::test]
async fn test_zero_id_policies() {
    let weights = "0.5 0\n0.7 3\n0.9 1\n";
    let features = "3\n0 zero\n1 one\n3 three\n";

    let job = Job::new(weights, features);
    for res in run_group(3, &ShardJoinConfig::default(), &job).await {
        res.unwrap();
    }
    assert_eq!(job.output(), "0.5 0 zero\n0.7 3 three\n0.9 1 one\n");

    let job = Job::new(weights, features);
    let legacy = ShardJoinConfig {
        zero_id: ZeroIdPolicy::Legacy,
        ..ShardJoinConfig::default()
    };
    for res in run_group(3, &legacy, &job).await {
        res.unwrap();
    }
    // No rank owns id 0, so its weight line is dropped.
    assert_eq!(job.output(), "0.7 3 three\n0.9 1 one\n");
}

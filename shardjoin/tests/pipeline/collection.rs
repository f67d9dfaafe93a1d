use super::helpers::{Job, run_group};
use shardjoin::{
    CollectStats, LocalTransport, RoleReport, SendStats, ShardJoinConfig, StreamCollector,
    StreamSender,
};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_empty_partial_appends_nothing() {
    // Rank 0 owns every id; rank 1's partial file is empty.
    let job = Job::new("0.5 2\n0.7 4\n", "2\n2 two\n4 four\n");
    let results = run_group(2, &ShardJoinConfig::default(), &job).await;
    let reports: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    assert_eq!(job.partial(1), "");
    assert_eq!(
        reports[1].role,
        RoleReport::Sent(SendStats {
            frames: 2,
            lines: 0,
            bytes: 0,
        })
    );
    let own = job.partial(0);
    assert_eq!(own, "0.5 2 two\n0.7 4 four\n");
    assert_eq!(
        reports[0].role,
        RoleReport::Collected(CollectStats {
            own_bytes: own.len() as u64,
            frames: 2,
            bytes: 0,
            frames_per_rank: BTreeMap::from([(1, 2)]),
        })
    );
    assert_eq!(job.output(), own);
}

#[tokio::test]
async fn test_single_rank_output_is_identity_copy() {
    let job = Job::new("0.5 2\n0.1 9\n0.7 4\n", "3\n2 two\n4 four\n9 nine x y\n");
    let results = run_group(1, &ShardJoinConfig::default(), &job).await;
    let report = results.into_iter().next().unwrap().unwrap();

    let partial = std::fs::read(job.partial_path(0)).unwrap();
    assert_eq!(std::fs::read(&job.paths.output).unwrap(), partial);
    match report.role {
        RoleReport::Collected(stats) => {
            assert_eq!(stats.frames, 0);
            assert_eq!(stats.own_bytes, partial.len() as u64);
        }
        other => panic!("single rank must collect, got {other:?}"),
    }
}

#[tokio::test]
async fn test_collector_output_starts_with_own_partial() {
    let job = Job::new("0.5 3\n0.2 1\n0.3 6\n", "3\n1 one\n3 three\n6 six\n");
    for res in run_group(3, &ShardJoinConfig::default(), &job).await {
        res.unwrap();
    }
    let own = job.partial(0);
    assert_eq!(own, "0.5 3 three\n0.3 6 six\n");
    assert_eq!(job.output(), format!("{own}0.2 1 one\n"));
}

#[tokio::test]
async fn test_round_robin_interleaves_senders() {
    let dir = tempfile::tempdir().unwrap();
    let own = dir.path().join("own");
    let out = dir.path().join("out");
    std::fs::write(&own, "c0\n").unwrap();

    let mesh = LocalTransport::mesh(3).unwrap();
    let s1 = StreamSender::new(&mesh[1], 0, 1);
    let s2 = StreamSender::new(&mesh[2], 0, 1);
    let p = std::path::Path::new("partial");
    s1.send_reader(&b"a1\na2\n"[..], p).await.unwrap();
    s2.send_reader(&b"b1\n"[..], p).await.unwrap();

    let stats = StreamCollector::new(&mesh[0], &ShardJoinConfig::default())
        .collect(&own, &out)
        .await
        .unwrap();

    // Round 1: a1, b1. Round 2: a2, rank 2's trailing empty chunk.
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "c0\na1\nb1\na2\n");
    assert_eq!(stats.frames_per_rank, BTreeMap::from([(1, 4), (2, 3)]));
}

#[tokio::test]
async fn test_small_flush_threshold_keeps_bytes_intact() {
    let dir = tempfile::tempdir().unwrap();
    let own = dir.path().join("own");
    let out = dir.path().join("out");
    std::fs::write(&own, "").unwrap();

    let mesh = LocalTransport::mesh(2).unwrap();
    let body = "0.25 17 some longer origin text\n".repeat(40);
    StreamSender::new(&mesh[1], 0, 7)
        .send_reader(body.as_bytes(), std::path::Path::new("partial"))
        .await
        .unwrap();

    let config = ShardJoinConfig {
        flush_bytes: 3,
        ..ShardJoinConfig::default()
    };
    let stats = StreamCollector::new(&mesh[0], &config)
        .collect(&own, &out)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&out).unwrap(), body);
    assert_eq!(stats.bytes, body.len() as u64);
}

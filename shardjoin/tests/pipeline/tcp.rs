use super::helpers::{Job, generate, sorted_lines};
use shardjoin::{ShardJoinConfig, TcpTransport, run_node};

/// Run the whole pipeline with one TCP endpoint per rank.
async fn run_over_tcp(world_size: u32, config: &ShardJoinConfig, job: &Job) {
    let star = TcpTransport::bootstrap_local(world_size, config)
        .await
        .unwrap();
    let mut handles = Vec::new();
    for transport in star {
        let config = config.clone();
        let paths = job.paths.clone();
        handles.push(tokio::spawn(async move {
            run_node(&transport, &config, &paths).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_tcp_three_node_scenario() {
    let job = Job::new("0.5 4\n0.2 7\n", "2\n4 apple\n7 banana\n");
    run_over_tcp(3, &ShardJoinConfig::default(), &job).await;
    assert_eq!(job.output(), "0.5 4 apple\n0.2 7 banana\n");
}

#[tokio::test]
async fn test_tcp_matches_join_with_small_chunks() {
    let data = generate(4, 80, 500);
    let job = Job::new(&data.weights, &data.features);
    let config = ShardJoinConfig {
        lines_per_chunk: 3,
        collector_rank: 1,
        ..ShardJoinConfig::default()
    };
    run_over_tcp(4, &config, &job).await;

    let mut expected = data.expected;
    expected.sort();
    assert_eq!(sorted_lines(&job.output()), expected);
}

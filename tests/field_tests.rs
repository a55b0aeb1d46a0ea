use std::sync::Arc;
use std::time::Duration;

use fleet_auction::agent::{AgentState, CostOracle, EuclideanOracle, FieldOracle, Zone};
use fleet_auction::auction::JobStatus;
use fleet_auction::config::{AuctionConfig, FieldConfig, FleetConfig, MAX_TRAVEL};
use fleet_auction::error::AuctionError;
use fleet_auction::field::Field;
use fleet_auction::geometry::Position;
use tokio_util::sync::CancellationToken;

/// Oracle pricing every trip at an absurd but finite cost
#[derive(Debug)]
struct FarAway;

impl CostOracle for FarAway {
    fn cost(&self, _from: Position, _to: Position) -> Option<f64> {
        Some(1e300)
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// Test fleet with a fixed seed so job placement is reproducible
fn test_fleet(agents: usize, max_jobs: Option<usize>) -> FleetConfig {
    let field = FieldConfig {
        max_jobs,
        seed: Some(11),
        ..FieldConfig::default()
    };
    FleetConfig::new(AuctionConfig::default(), field).with_agents(agents)
}

#[test]
fn test_field_requires_agents() {
    let err = Field::new(test_fleet(0, None), Arc::new(EuclideanOracle)).unwrap_err();
    assert!(matches!(err, AuctionError::Config(_)));
}

#[test]
fn test_field_rejects_invalid_timing() {
    let mut config = test_fleet(2, None);
    config.auction.stale_winner_requeue_ms = 5000;
    assert!(Field::new(config, Arc::new(EuclideanOracle)).is_err());
}

#[test]
fn test_step_spawns_awards_and_completes() {
    let mut field = Field::new(test_fleet(1, Some(1)), Arc::new(EuclideanOracle)).unwrap();
    assert_eq!(field.next_wakeup(), ms(500));

    // First spawn, announced in the same turn
    assert_eq!(field.step(ms(500)), 0);
    assert_eq!(field.auctioneer().registry().count_by_status(JobStatus::Bidding), 1);

    // Window closes, the only agent wins and departs
    assert_eq!(field.step(ms(600)), 1);
    let (_, agent) = field.auctioneer().agents().next().unwrap();
    assert_eq!(agent.state(), AgentState::Working);
    assert!(!field.is_done());

    // Arrival is the only thing left to wait for
    let arrival = field.next_wakeup();
    assert!(arrival > ms(600));
    field.step(arrival);
    assert_eq!(field.completed(), 1);
    assert!(field.is_done());

    let (_, agent) = field.auctioneer().agents().next().unwrap();
    assert!(agent.is_idle());
    assert_eq!(agent.position(), agent.home());
}

#[test]
fn test_huge_cost_caps_travel_time() {
    let mut field = Field::new(test_fleet(1, Some(1)), Arc::new(FarAway)).unwrap();

    field.step(ms(500));
    assert_eq!(field.step(ms(600)), 1);
    assert_eq!(field.next_wakeup(), ms(600) + MAX_TRAVEL);

    field.step(ms(600) + MAX_TRAVEL);
    assert_eq!(field.completed(), 1);
}

#[test]
fn test_crawling_agents_cap_travel_time() {
    let mut config = test_fleet(1, Some(1));
    config.field.agent_speed = 1e-30;
    let mut field = Field::new(config, Arc::new(EuclideanOracle)).unwrap();

    field.step(ms(500));
    assert_eq!(field.step(ms(600)), 1);
    assert_eq!(field.next_wakeup(), ms(600) + MAX_TRAVEL);
}

#[test]
fn test_unreachable_jobs_stay_in_the_pool() {
    // Agents can only reach a tiny patch around the origin
    let oracle = FieldOracle::new(Zone::centered(0.01, 0.01));
    let mut field = Field::new(test_fleet(2, None), Arc::new(oracle)).unwrap();

    field.step(ms(500));
    field.step(ms(600));

    let registry = field.auctioneer().registry();
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.count_by_status(JobStatus::Pending), 1);
    assert_eq!(field.auctioneer().stats().no_bid_requeues, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_completes_job_limit() {
    let field = Field::new(test_fleet(3, Some(5)), Arc::new(EuclideanOracle)).unwrap();

    let report = field.run(CancellationToken::new()).await;

    assert_eq!(report.completed, 5);
    assert_eq!(report.snapshot.stats.published, 5);
    assert_eq!(report.snapshot.stats.completed, 5);
    assert!(report.snapshot.jobs.is_empty());
    assert!(report
        .snapshot
        .agents
        .iter()
        .all(|a| a.state == AgentState::Idle && a.job.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancel() {
    let field = Field::new(test_fleet(2, None), Arc::new(EuclideanOracle)).unwrap();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(3_250)).await;
        trigger.cancel();
    });

    let report = field.run(cancel).await;

    // One job every 500ms until the cancel at 3.25s
    assert_eq!(report.snapshot.stats.published, 6);
    assert!(report.elapsed_ms >= 3_000);
}

#[tokio::test(start_paused = true)]
async fn test_run_streams_events() {
    let field = Field::new(test_fleet(1, Some(1)), Arc::new(EuclideanOracle)).unwrap();
    let mut rx = field.subscribe();

    let report = field.run(CancellationToken::new()).await;
    assert_eq!(report.completed, 1);

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        let value = serde_json::to_value(&event).unwrap();
        kinds.push(value["event"].as_str().unwrap().to_string());
    }
    assert_eq!(kinds.first().map(String::as_str), Some("job_published"));
    assert!(kinds.iter().any(|k| k == "bid_submitted"));
    assert!(kinds.iter().any(|k| k == "job_awarded"));
    assert_eq!(kinds.last().map(String::as_str), Some("job_completed"));
}

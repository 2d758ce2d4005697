use std::sync::{Arc, Mutex};
use std::time::Duration;

use surge_core::{
    HttpClient, ProgressFn, ProgressUpdate, RequestPlan, RunConfig, ScenarioConfig, ScenarioOptions,
    ScenarioProgress, Stage, run_scenario, scenario_from_options,
};
use surge_testserver::TestServer;

fn short_ramp(url: String, start_rate: u64, target: u64, millis: u64) -> RunConfig {
    RunConfig {
        url: Some(url),
        timeout: Some(Duration::from_secs(5)),
        start_rate: Some(start_rate),
        time_unit: Some(Duration::from_secs(1)),
        pre_allocated_vus: Some(10),
        max_vus: Some(10),
        stages: vec![Stage {
            duration: Duration::from_millis(millis),
            target,
        }],
        graceful_stop: Some(Duration::from_secs(5)),
    }
}

fn plan_for(scenario: &ScenarioConfig) -> Arc<RequestPlan> {
    Arc::new(RequestPlan::new(scenario.target.clone()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_iteration_issues_exactly_one_request_and_one_check() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let cfg = short_ramp(server.urls().restaurants.clone(), 40, 40, 1_200);
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    let summary = run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), None)
        .await
        .unwrap_or_else(|e| panic!("run: {e}"));

    assert!(summary.iterations_total > 0);
    assert_eq!(summary.requests_total, summary.iterations_total);
    assert_eq!(summary.checks_total, summary.iterations_total);
    assert_eq!(server.stats().requests_total(), summary.requests_total);
    assert_eq!(summary.checks_failed, 0);
    assert!(summary.checks_passed());
    assert_eq!(summary.checks_by_name.len(), 1);
    assert_eq!(summary.checks_by_name[0].name, "is status 200");

    // 40/s for 1.2s is ~48 arrivals; allow slack for tick scheduling.
    assert!(
        (30..=60).contains(&summary.iterations_total),
        "unexpected iteration count {}",
        summary.iterations_total
    );

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_status_counts_as_failed_check_not_error() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let cfg = short_ramp(server.urls().status(500), 20, 20, 500);
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    let summary = run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), None)
        .await
        .unwrap_or_else(|e| panic!("run: {e}"));

    assert!(summary.iterations_total > 0);
    assert_eq!(summary.checks_failed, summary.iterations_total);
    assert!(!summary.checks_passed());
    assert_eq!(
        summary.errors.get("http_status:500").copied(),
        Some(summary.requests_total)
    );
    // No retries.
    assert_eq!(server.stats().requests_total(), summary.iterations_total);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_graceful_stop_interrupts_running_iterations() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    // Arrivals every 10ms against a 50ms endpoint keep several iterations in flight.
    let mut cfg = short_ramp(server.urls().slow.clone(), 100, 100, 500);
    cfg.graceful_stop = Some(Duration::ZERO);
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    let summary = run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), None)
        .await
        .unwrap_or_else(|e| panic!("run: {e}"));

    assert!(summary.interrupted_iterations_total > 0);
    assert!(summary.iterations_total > 0);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn graceful_stop_expiry_with_idle_and_busy_vus_interrupts_only_busy_ones() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    // One arrival per 10ms tick against a 50ms endpoint: about five VUs are busy at the
    // end of the stage while the rest of the pool is idle and exits on `mark_done`.
    let mut cfg = short_ramp(server.urls().slow.clone(), 100, 100, 300);
    cfg.pre_allocated_vus = Some(20);
    cfg.max_vus = Some(20);
    cfg.graceful_stop = Some(Duration::from_millis(10));
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    for round in 0..5 {
        let summary = run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), None)
            .await
            .unwrap_or_else(|e| panic!("round {round}: run: {e}"));

        assert!(
            summary.interrupted_iterations_total > 0,
            "round {round}: expected interrupted iterations"
        );
        assert!(
            summary.interrupted_iterations_total < 20,
            "round {round}: idle VUs must not count as interrupted, got {}",
            summary.interrupted_iterations_total
        );
        assert!(summary.iterations_total > 0, "round {round}: no iterations");
    }

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn undersized_pool_drops_iterations() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let mut cfg = short_ramp(server.urls().slow.clone(), 200, 200, 500);
    cfg.pre_allocated_vus = Some(1);
    cfg.max_vus = Some(1);
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    let summary = run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), None)
        .await
        .unwrap_or_else(|e| panic!("run: {e}"));

    // One VU at 50ms/iteration cannot keep up with 200 arrivals/s.
    assert!(summary.dropped_iterations_total > 0);
    assert!(summary.iterations_total < 100);

    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_reports_stage_and_pool() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("start test server: {e}"));

    let cfg = short_ramp(server.urls().restaurants.clone(), 10, 30, 2_300);
    let scenario = scenario_from_options(ScenarioOptions::ramping_test(), cfg)
        .unwrap_or_else(|e| panic!("scenario: {e}"));

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let progress: ProgressFn = {
        let updates = updates.clone();
        Arc::new(move |u| {
            updates
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(u);
        })
    };

    run_scenario(&scenario, plan_for(&scenario), HttpClient::default(), Some(progress))
        .await
        .unwrap_or_else(|e| panic!("run: {e}"));

    let updates = updates
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    assert!(updates.len() >= 2, "expected >= 2 updates, got {}", updates.len());
    assert_eq!(updates[0].tick, 1);
    assert_eq!(updates[0].scenario, "ramping_test");

    let ScenarioProgress::RampingArrivalRate {
        stage,
        max_vus,
        total_duration,
        ..
    } = &updates[0].progress;
    assert_eq!(*max_vus, 10);
    assert_eq!(*total_duration, Duration::from_millis(2_300));
    let stage = stage
        .as_ref()
        .unwrap_or_else(|| panic!("expected stage progress"));
    assert_eq!(stage.stage, 1);
    assert_eq!(stage.start_target, 10);
    assert_eq!(stage.end_target, 30);
    assert!(updates[0].metrics.requests_total > 0);

    server.shutdown().await;
}

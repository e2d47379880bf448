use iot_twin_abstract::TwinConfig;
use iot_twin_control::{
    FileActionSource, FileMetricsSink, IterationBudget, IterationOutcome, LoopState,
    read_latest_metrics, run_iteration, write_action,
};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn config_in(dir: &Path, simulation_time_s: f64) -> TwinConfig {
    TwinConfig {
        simulation_time_s,
        action_path: dir.join("action.txt"),
        metrics_path: dir.join("metrics.txt"),
        ..Default::default()
    }
}

/// One iteration as a freshly started process would run it.
fn run_process(
    config: &TwinConfig,
    rate_override: Option<&str>,
) -> anyhow::Result<IterationOutcome> {
    run_iteration(
        config,
        &IterationBudget::new(1),
        &FileActionSource::new(&config.action_path),
        Box::new(FileMetricsSink::new(&config.metrics_path)),
        rate_override,
    )
}

fn app_rate(outcome: &IterationOutcome, name: &str) -> String {
    outcome
        .report
        .apps
        .iter()
        .find(|a| a.name == name)
        .map(|a| a.data_rate.clone())
        .unwrap()
}

#[test]
fn stored_action_drives_only_the_controlled_device() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10.0);
    write_action(&config.action_path, "3Mbps").unwrap();

    let outcome = run_process(&config, None).unwrap();

    assert_eq!(outcome.action.as_str(), "3Mbps");
    assert_eq!(outcome.data_rate, "3Mbps");
    assert_eq!(app_rate(&outcome, "thermostat"), "3Mbps");
    assert_eq!(app_rate(&outcome, "camera"), "10Mbps");
    assert_eq!(app_rate(&outcome, "lights"), "1Mbps");
}

#[test]
fn feedback_fires_before_nominal_end_and_logs_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 60.0);
    write_action(&config.action_path, "2Mbps").unwrap();

    let outcome = run_process(&config, None).unwrap();

    assert_eq!(outcome.state, LoopState::Stopped);
    assert_eq!(outcome.stopped_at, Duration::from_secs(55));
    assert!(outcome.stopped_at <= Duration::from_secs(60));
    assert_eq!(outcome.metrics.flow_count, 3);
    assert!(outcome.metrics.avg_throughput_mbps > 0.0);
    assert!((0.0..=100.0).contains(&outcome.metrics.avg_packet_loss_percent));

    let log = fs::read_to_string(&config.metrics_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    let entry = read_latest_metrics(&config.metrics_path).unwrap().unwrap();
    assert_eq!(entry.data_rate, "2Mbps");
    assert_eq!(
        entry.packet_loss_percent,
        outcome.metrics.avg_packet_loss_percent.trunc()
    );
}

#[test]
fn consecutive_runs_append_to_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 8.0);

    write_action(&config.action_path, "1Mbps").unwrap();
    run_process(&config, None).unwrap();
    let first = fs::read_to_string(&config.metrics_path).unwrap();

    write_action(&config.action_path, "4Mbps").unwrap();
    run_process(&config, None).unwrap();
    let second = fs::read_to_string(&config.metrics_path).unwrap();

    assert!(second.starts_with(&first));
    assert_eq!(second.lines().count(), 2);
    assert!(second.lines().last().unwrap().ends_with(" 4Mbps"));
}

#[test]
fn missing_action_store_aborts_before_any_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10.0);

    assert!(run_process(&config, None).is_err());
    assert!(!config.metrics_path.exists());
}

#[test]
fn unwritable_metrics_log_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), 10.0);
    config.metrics_path = dir.path().join("missing-dir").join("metrics.txt");
    write_action(&config.action_path, "1Mbps").unwrap();

    let err = run_process(&config, None).unwrap_err();
    assert!(format!("{err:#}").contains("metrics log"));
}

#[test]
fn malformed_action_is_rejected_by_the_traffic_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10.0);
    write_action(&config.action_path, "turbo").unwrap();

    assert!(run_process(&config, None).is_err());
    assert!(!config.metrics_path.exists());
}

#[test]
fn rate_beyond_the_maximum_fails_before_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10.0);
    write_action(&config.action_path, "10000Gbps").unwrap();

    let err = run_process(&config, None).unwrap_err();
    assert!(format!("{err:#}").contains("exceeds the supported maximum"));
    assert!(!config.metrics_path.exists());
}

#[test]
fn infinite_run_length_is_reported_not_a_panic() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), f64::INFINITY);
    write_action(&config.action_path, "1Mbps").unwrap();

    assert!(run_process(&config, None).is_err());
    assert!(!config.metrics_path.exists());
}

#[test]
fn override_replaces_the_stored_action() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 10.0);
    write_action(&config.action_path, "1Mbps").unwrap();

    let outcome = run_process(&config, Some("6Mbps")).unwrap();
    assert_eq!(outcome.data_rate, "6Mbps");
    assert_eq!(app_rate(&outcome, "thermostat"), "6Mbps");
}

//! Runs in its own test binary, so the process-wide iteration budget starts
//! untouched.

use iot_twin_abstract::TwinConfig;
use iot_twin_control::{
    ControlError, IterationBudget, MAX_ITERATIONS_PER_PROCESS, run_file_iteration, write_action,
};
use std::fs;

#[test]
fn second_iteration_in_one_process_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = TwinConfig {
        simulation_time_s: 8.0,
        action_path: dir.path().join("action.txt"),
        metrics_path: dir.path().join("metrics.txt"),
        ..Default::default()
    };
    write_action(&config.action_path, "1Mbps").unwrap();

    run_file_iteration(&config, None).unwrap();
    assert_eq!(
        IterationBudget::process().claimed(),
        MAX_ITERATIONS_PER_PROCESS
    );

    write_action(&config.action_path, "4Mbps").unwrap();
    let err = run_file_iteration(&config, None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ControlError>(),
        Some(ControlError::IterationLimit { limit: 1 })
    ));

    let log = fs::read_to_string(&config.metrics_path).unwrap();
    assert_eq!(log.lines().count(), 1);
    assert!(log.trim_end().ends_with(" 1Mbps"));
}

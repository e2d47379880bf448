use crate::action::{Action, ActionSource, FileActionSource};
use crate::context::{ControlLoopContext, IterationBudget};
use crate::metrics::AggregateMetrics;
use crate::scheduler::{FeedbackLoopScheduler, LoopState};
use crate::sink::{FileMetricsSink, MetricsSink};
use crate::traffic::TrafficController;
use anyhow::{Context, bail};
use iot_twin_abstract::TwinConfig;
use iot_twin_simulator::{RunReport, SmartHome};
use std::time::Duration;
use tracing::{info, warn};

/// What one control-loop iteration produced.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub action: Action,
    /// Rate string applied to the controlled endpoint.
    pub data_rate: String,
    pub metrics: AggregateMetrics,
    pub state: LoopState,
    pub stopped_at: Duration,
    pub report: RunReport,
}

/// One sense-decide-act iteration: read the action, configure traffic, run
/// the smart home until the feedback callback has logged its metrics.
///
/// `rate_override` replaces the stored action after it has been read; the
/// store must still be readable. The iteration is claimed from `budget`
/// before the simulation is built.
pub fn run_iteration(
    config: &TwinConfig,
    budget: &IterationBudget,
    actions: &dyn ActionSource,
    sink: Box<dyn MetricsSink>,
    rate_override: Option<&str>,
) -> anyhow::Result<IterationOutcome> {
    let mut action = actions.read_action()?;
    info!("Initial Data Rate: {}", action);
    if let Some(rate) = rate_override.filter(|r| *r != action.as_str()) {
        warn!(
            "Overriding stored action {} with {}; the controller's decision is ignored",
            action, rate
        );
        action = Action::new(rate);
    }

    let total = config
        .simulation_time()
        .context("Invalid simulation time")?;
    let lookback = config.lookback().context("Invalid lookback")?;

    let mut home = SmartHome::build(config.clone()).context("Failed to build smart home")?;
    let mut ctx = ControlLoopContext::new(home.thermostat, action);
    let iteration = ctx.begin_iteration(budget)?;
    info!(
        "Control iteration {}/{}",
        iteration,
        ctx.max_iterations()
    );

    let data_rate = TrafficController::new(ctx.controlled()).apply(&mut home.sim, ctx.action())?;

    let mut scheduler = FeedbackLoopScheduler::new(total, lookback)?;
    scheduler.arm(&mut home.sim, sink, data_rate.clone())?;

    home.sim.run()?;

    let state = scheduler.state();
    let Some(metrics) = scheduler.metrics() else {
        bail!(
            "run ended at {:?} in state {:?} without logging metrics",
            home.sim.current_time(),
            state
        );
    };

    Ok(IterationOutcome {
        action: ctx.action().clone(),
        data_rate,
        metrics,
        state,
        stopped_at: home.sim.current_time(),
        report: home.sim.export_report(),
    })
}

/// `run_iteration` against the action store and metrics log named in
/// `config`, charged to the process-wide budget: a second call in the same
/// process fails with [`ControlError::IterationLimit`](crate::ControlError).
pub fn run_file_iteration(
    config: &TwinConfig,
    rate_override: Option<&str>,
) -> anyhow::Result<IterationOutcome> {
    let actions = FileActionSource::new(&config.action_path);
    let sink = FileMetricsSink::new(&config.metrics_path);
    run_iteration(
        config,
        IterationBudget::process(),
        &actions,
        Box::new(sink),
        rate_override,
    )
}

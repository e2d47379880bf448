//! Reference controller for the digital twin: reads the latest metrics,
//! picks the next rate and hands it back through the action store.

use anyhow::{Context, Result, bail};
use iot_twin_abstract::TwinConfig;
use iot_twin_control::{MetricsLogEntry, read_latest_metrics, write_action};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

pub trait RatePolicy {
    fn decide(&self, metrics: &MetricsLogEntry) -> String;
}

/// Back off under heavy loss, push harder when throughput is low, otherwise
/// hold a steady rate.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    pub loss_limit_percent: f64,
    pub throughput_floor_mbps: f64,
    pub reduced_rate: String,
    pub increased_rate: String,
    pub steady_rate: String,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            loss_limit_percent: 10.0,
            throughput_floor_mbps: 5.0,
            reduced_rate: "5Mbps".into(),
            increased_rate: "15Mbps".into(),
            steady_rate: "10Mbps".into(),
        }
    }
}

impl RatePolicy for ThresholdPolicy {
    fn decide(&self, metrics: &MetricsLogEntry) -> String {
        if metrics.packet_loss_percent > self.loss_limit_percent {
            self.reduced_rate.clone()
        } else if metrics.throughput_mbps < self.throughput_floor_mbps {
            self.increased_rate.clone()
        } else {
            self.steady_rate.clone()
        }
    }
}

/// Starts the twin binary once per control round. Every round is a fresh
/// process, so the twin's one-iteration-per-process limit always holds.
#[derive(Debug, Clone)]
pub struct TwinLauncher {
    program: PathBuf,
    args: Vec<String>,
}

impl TwinLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Launcher passing the file locations and run shape of `twin` as flags.
    pub fn for_config(program: impl Into<PathBuf>, twin: &TwinConfig) -> Self {
        Self::new(program)
            .arg("--action-file")
            .arg(twin.action_path.display().to_string())
            .arg("--metrics-file")
            .arg(twin.metrics_path.display().to_string())
            .arg("--n-iot-devices")
            .arg(twin.n_iot_devices.to_string())
            .arg("--simulation-time")
            .arg(twin.simulation_time_s.to_string())
            .arg("--lookback")
            .arg(twin.lookback_s.to_string())
            .arg("--seed")
            .arg(twin.seed.to_string())
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run one twin process to completion. A spawn failure or a non-zero
    /// exit is an error.
    pub fn run_once(&self) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("Failed to start {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {}", self.program.display(), status);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub iteration: u32,
    pub metrics: MetricsLogEntry,
    pub next_rate: String,
}

/// Drive `iterations` rounds of the loop. A round whose twin process fails
/// or leaves no metrics is skipped; the action store then stays as it was.
pub fn run_agent(
    twin: &TwinConfig,
    launcher: &TwinLauncher,
    policy: &dyn RatePolicy,
    iterations: u32,
    initial_rate: Option<&str>,
) -> Result<Vec<Decision>> {
    if let Some(rate) = initial_rate
        && !twin.action_path.exists()
    {
        info!("Seeding {} with {}", twin.action_path.display(), rate);
        write_action(&twin.action_path, rate)?;
    }

    let mut decisions = Vec::new();
    for iteration in 1..=iterations {
        info!("Iteration {}", iteration);

        if let Err(e) = launcher.run_once() {
            warn!("Twin run failed: {e:#}");
            continue;
        }

        let Some(metrics) = read_latest_metrics(&twin.metrics_path)? else {
            warn!("No metrics found, retrying...");
            continue;
        };
        info!(
            "Metrics: Throughput={} Mbps, Delay={} ms, Packet Loss={}%",
            metrics.throughput_mbps, metrics.avg_delay_ms, metrics.packet_loss_percent
        );

        let next_rate = policy.decide(&metrics);
        write_action(&twin.action_path, &next_rate)?;
        info!("Updated data rate {} written to {}", next_rate, twin.action_path.display());

        decisions.push(Decision {
            iteration,
            metrics,
            next_rate,
        });
    }
    Ok(decisions)
}

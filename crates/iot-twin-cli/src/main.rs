use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use iot_twin_abstract::{TwinConfig, TwinConfigOverride};
use iot_twin_control::{format_number, run_file_iteration};
use iot_twin_simulator::RunReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "Smart-home digital twin: one control-loop iteration")]
struct Args {
    /// TOML file overriding the built-in configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of nodes, gateway included.
    #[arg(long)]
    n_iot_devices: Option<u32>,

    /// Nominal run length in simulated seconds.
    #[arg(long)]
    simulation_time: Option<f64>,

    /// Seconds before the nominal end at which metrics are collected.
    #[arg(long)]
    lookback: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Data rate applied instead of the one in the action store.
    #[arg(long)]
    action: Option<String>,

    #[arg(long)]
    action_file: Option<PathBuf>,

    #[arg(long)]
    metrics_file: Option<PathBuf>,

    /// Write a JSON report of the finished run.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("iot-twin starting…");

    let config = args.build_config()?;
    let outcome = run_file_iteration(&config, args.action.as_deref())?;

    info!(
        "Logged {} Mbps / {} ms / {}% at rate {} to {}",
        format_number(outcome.metrics.avg_throughput_mbps),
        format_number(outcome.metrics.avg_delay_ms),
        format_number(outcome.metrics.avg_packet_loss_percent),
        outcome.data_rate,
        config.metrics_path.display()
    );

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &outcome.report)?;
    }

    Ok(())
}

impl Args {
    /// Defaults, then the TOML file, then command-line flags.
    fn build_config(&self) -> Result<TwinConfig> {
        let mut config = TwinConfig::default();
        if let Some(path) = &self.config {
            load_override(path)?.apply_to(&mut config);
        }

        if let Some(v) = self.n_iot_devices {
            config.n_iot_devices = v;
        }
        if let Some(v) = self.simulation_time {
            config.simulation_time_s = v;
        }
        if let Some(v) = self.lookback {
            config.lookback_s = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = &self.action_file {
            config.action_path = v.clone();
        }
        if let Some(v) = &self.metrics_file {
            config.metrics_path = v.clone();
        }
        Ok(config)
    }
}

fn load_override(path: &Path) -> Result<TwinConfigOverride> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let over: TwinConfigOverride =
        toml::from_str(&content).context("Failed to parse config file")?;
    Ok(over)
}

fn write_trace(path: &Path, report: &RunReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}

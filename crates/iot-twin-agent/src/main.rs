use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use iot_twin_abstract::TwinConfig;
use iot_twin_agent::{ThresholdPolicy, TwinLauncher, run_agent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Rule-based rate controller for the smart-home twin")]
struct Args {
    /// Twin binary started once per round. Defaults to `iot-twin` next to
    /// this executable, then on `PATH`.
    #[arg(long)]
    twin_bin: Option<PathBuf>,

    /// Control-loop rounds to run.
    #[arg(long, default_value_t = 10)]
    iterations: u32,

    /// Rate written to the action store when it does not exist yet.
    #[arg(long)]
    initial_rate: Option<String>,

    #[arg(long, default_value = "action.txt")]
    action_file: PathBuf,

    #[arg(long, default_value = "metrics.txt")]
    metrics_file: PathBuf,

    /// Nominal run length of each twin iteration, in simulated seconds.
    #[arg(long)]
    simulation_time: Option<f64>,

    /// Loss percentage above which the rate is reduced.
    #[arg(long, default_value_t = 10.0)]
    loss_limit: f64,

    /// Throughput (Mbps) below which the rate is increased.
    #[arg(long, default_value_t = 5.0)]
    throughput_floor: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("iot-twin-agent starting...");

    let mut twin = TwinConfig {
        action_path: args.action_file.clone(),
        metrics_path: args.metrics_file.clone(),
        ..Default::default()
    };
    if let Some(v) = args.simulation_time {
        twin.simulation_time_s = v;
    }

    let policy = ThresholdPolicy {
        loss_limit_percent: args.loss_limit,
        throughput_floor_mbps: args.throughput_floor,
        ..Default::default()
    };

    let program = args.twin_bin.clone().unwrap_or_else(default_twin_bin);
    info!("Twin binary: {}", program.display());
    let launcher = TwinLauncher::for_config(program, &twin);

    let decisions = run_agent(
        &twin,
        &launcher,
        &policy,
        args.iterations,
        args.initial_rate.as_deref(),
    )?;
    info!(
        "Finished {} rounds, {} decisions | last rate: {}",
        args.iterations,
        decisions.len(),
        decisions
            .last()
            .map(|d| d.next_rate.as_str())
            .unwrap_or("unchanged")
    );
    Ok(())
}

fn default_twin_bin() -> PathBuf {
    let name = format!("iot-twin{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}

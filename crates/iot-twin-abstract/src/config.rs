use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} = {value} is not a representable duration in seconds")]
    Duration { field: &'static str, value: f64 },
}

/// Shared wireless medium between the access point and the stations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelConfig {
    /// Effective medium capacity in bits per second.
    pub capacity_bps: u64,
    /// Packets that may wait for the medium before new arrivals are dropped.
    pub queue_limit: usize,
    /// Probability that a transmitted packet is lost on the air.
    pub loss_rate: f64,
    pub min_latency_us: u64,
    pub max_latency_us: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity_bps: 20_000_000,
            queue_limit: 100,
            loss_rate: 0.0,
            min_latency_us: 50,
            max_latency_us: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TwinConfig {
    /// Total node count, gateway included.
    pub n_iot_devices: u32,
    /// Nominal run length in simulated seconds.
    pub simulation_time_s: f64,
    /// How long before the nominal end the feedback callback fires.
    pub lookback_s: f64,
    /// Start time of every traffic application.
    pub app_start_s: f64,
    /// UDP payload size of every traffic application.
    pub packet_size: u32,
    pub seed: u64,
    pub action_path: PathBuf,
    pub metrics_path: PathBuf,
    pub channel: ChannelConfig,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            n_iot_devices: 4,
            simulation_time_s: 60.0,
            lookback_s: 5.0,
            app_start_s: 1.0,
            packet_size: 1024,
            seed: 1,
            action_path: PathBuf::from("action.txt"),
            metrics_path: PathBuf::from("metrics.txt"),
            channel: ChannelConfig::default(),
        }
    }
}

/// Negative seconds clamp to zero; infinite or oversized values are errors.
fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value.max(0.0)).map_err(|_| ConfigError::Duration { field, value })
}

impl TwinConfig {
    pub fn simulation_time(&self) -> Result<Duration, ConfigError> {
        seconds("simulation_time_s", self.simulation_time_s)
    }

    pub fn lookback(&self) -> Result<Duration, ConfigError> {
        seconds("lookback_s", self.lookback_s)
    }

    pub fn app_start(&self) -> Result<Duration, ConfigError> {
        seconds("app_start_s", self.app_start_s)
    }
}

use crate::config::{ChannelConfig, TwinConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Partial configuration read from a TOML file. Unset fields keep the
/// value already present in the target config.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct TwinConfigOverride {
    pub n_iot_devices: Option<u32>,
    pub simulation_time_s: Option<f64>,
    pub lookback_s: Option<f64>,
    pub app_start_s: Option<f64>,
    pub packet_size: Option<u32>,
    pub seed: Option<u64>,
    pub action_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub channel: Option<ChannelOverride>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ChannelOverride {
    pub capacity_bps: Option<u64>,
    pub queue_limit: Option<usize>,
    pub loss_rate: Option<f64>,
    pub min_latency_us: Option<u64>,
    pub max_latency_us: Option<u64>,
}

impl TwinConfigOverride {
    pub fn apply_to(&self, config: &mut TwinConfig) {
        if let Some(v) = self.n_iot_devices {
            config.n_iot_devices = v;
        }
        if let Some(v) = self.simulation_time_s {
            config.simulation_time_s = v;
        }
        if let Some(v) = self.lookback_s {
            config.lookback_s = v;
        }
        if let Some(v) = self.app_start_s {
            config.app_start_s = v;
        }
        if let Some(v) = self.packet_size {
            config.packet_size = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = &self.action_path {
            config.action_path = v.clone();
        }
        if let Some(v) = &self.metrics_path {
            config.metrics_path = v.clone();
        }
        if let Some(channel) = &self.channel {
            channel.apply_to(&mut config.channel);
        }
    }
}

impl ChannelOverride {
    pub fn apply_to(&self, channel: &mut ChannelConfig) {
        if let Some(v) = self.capacity_bps {
            channel.capacity_bps = v;
        }
        if let Some(v) = self.queue_limit {
            channel.queue_limit = v;
        }
        if let Some(v) = self.loss_rate {
            channel.loss_rate = v;
        }
        if let Some(v) = self.min_latency_us {
            channel.min_latency_us = v;
        }
        if let Some(v) = self.max_latency_us {
            channel.max_latency_us = v;
        }
    }
}

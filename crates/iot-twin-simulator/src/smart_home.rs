//! The smart-home cell: one access point acting as gateway and three IoT
//! stations streaming UDP towards it.

use crate::app::OnOffConfig;
use crate::engine::Simulator;
use crate::topology::{GridLayout, NodeId};
use anyhow::{Context, bail};
use iot_twin_abstract::{AppId, Timeline, TwinConfig};
use std::time::Duration;
use tracing::info;

/// Gateway port of the first device class; the others follow consecutively.
pub const BASE_PORT: u16 = 9;

/// Rate a controlled device idles at until a control action is applied.
pub const IDLE_RATE: &str = "0bps";

/// Traffic shape of one device class.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProfile {
    pub name: &'static str,
    /// `None` marks the device whose rate is set by the control loop.
    pub fixed_rate: Option<&'static str>,
    pub on_time_s: u64,
    pub off_time_s: u64,
}

pub const THERMOSTAT: DeviceProfile = DeviceProfile {
    name: "thermostat",
    fixed_rate: None,
    on_time_s: 5,
    off_time_s: 0,
};

pub const CAMERA: DeviceProfile = DeviceProfile {
    name: "camera",
    fixed_rate: Some("10Mbps"),
    on_time_s: 1,
    off_time_s: 0,
};

pub const LIGHTS: DeviceProfile = DeviceProfile {
    name: "lights",
    fixed_rate: Some("1Mbps"),
    on_time_s: 10,
    off_time_s: 0,
};

pub struct SmartHome {
    pub sim: Simulator,
    pub gateway: NodeId,
    /// Closed-loop controlled source.
    pub thermostat: AppId,
    pub camera: AppId,
    pub lights: AppId,
}

impl SmartHome {
    /// Lay out the cell, install the three device applications and the
    /// gateway sink, and arm the nominal end of the run.
    pub fn build(config: TwinConfig) -> anyhow::Result<Self> {
        if config.n_iot_devices < 4 {
            bail!(
                "smart home needs at least 4 nodes (gateway + 3 devices), got {}",
                config.n_iot_devices
            );
        }

        let start = config.app_start().context("Invalid application start time")?;
        let stop = config.simulation_time().context("Invalid simulation time")?;
        let packet_size = config.packet_size;

        let mut sim = Simulator::new(config.clone());
        let nodes = sim.create_nodes(config.n_iot_devices, &GridLayout::default());
        let gateway = nodes[0];

        let mut install = |profile: &DeviceProfile, node: NodeId, port: u16| {
            sim.install_on_off(OnOffConfig {
                name: profile.name.to_string(),
                node,
                remote: gateway,
                remote_port: port,
                data_rate: profile.fixed_rate.unwrap_or(IDLE_RATE).to_string(),
                packet_size,
                on_time: Duration::from_secs(profile.on_time_s),
                off_time: Duration::from_secs(profile.off_time_s),
                start,
                stop,
            })
        };
        let thermostat = install(&THERMOSTAT, nodes[1], BASE_PORT)?;
        let camera = install(&CAMERA, nodes[2], BASE_PORT + 1)?;
        let lights = install(&LIGHTS, nodes[3], BASE_PORT + 2)?;

        sim.install_sink(gateway, BASE_PORT)?;
        sim.stop_at(stop);

        info!(
            "Smart home ready: {} nodes, run length {:?}",
            config.n_iot_devices, stop
        );
        Ok(Self {
            sim,
            gateway,
            thermostat,
            camera,
            lights,
        })
    }
}

use crate::topology::NodeId;
use iot_twin_abstract::{DataRate, RateParseError, TrafficEndpoint};
use serde::Serialize;
use std::time::Duration;

/// Installation parameters for an on/off constant-bit-rate UDP source.
#[derive(Debug, Clone)]
pub struct OnOffConfig {
    pub name: String,
    pub node: NodeId,
    pub remote: NodeId,
    pub remote_port: u16,
    pub data_rate: String,
    pub packet_size: u32,
    pub on_time: Duration,
    pub off_time: Duration,
    pub start: Duration,
    pub stop: Duration,
}

/// Alternates between an "on" phase, in which it sends `packet_size` byte
/// payloads back to back at `data_rate`, and a silent "off" phase.
#[derive(Debug, Clone)]
pub struct OnOffApp {
    name: String,
    pub node: NodeId,
    pub remote: NodeId,
    pub local_port: u16,
    pub remote_port: u16,
    data_rate_spec: String,
    data_rate: DataRate,
    pub packet_size: u32,
    pub on_time: Duration,
    pub off_time: Duration,
    pub start: Duration,
    pub stop: Duration,
    pub running: bool,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

impl OnOffApp {
    pub fn new(config: OnOffConfig, local_port: u16) -> Result<Self, RateParseError> {
        let data_rate = config.data_rate.parse()?;
        Ok(Self {
            name: config.name,
            node: config.node,
            remote: config.remote,
            local_port,
            remote_port: config.remote_port,
            data_rate_spec: config.data_rate,
            data_rate,
            packet_size: config.packet_size,
            on_time: config.on_time,
            off_time: config.off_time,
            start: config.start,
            stop: config.stop,
            running: false,
            tx_packets: 0,
            tx_bytes: 0,
        })
    }

    /// Gap between two packets while the source is on.
    pub fn packet_interval(&self) -> Option<Duration> {
        self.data_rate.transmission_time(self.packet_size)
    }

    /// Time of the next transmission strictly after `now`, or `None` if the
    /// source has nothing left to send before it stops.
    pub fn next_send_after(&self, now: Duration) -> Option<Duration> {
        if self.on_time.is_zero() {
            return None;
        }
        let interval = self.packet_interval()?;
        if interval.is_zero() {
            return None;
        }
        let mut next = now + interval;

        if !self.off_time.is_zero() {
            let period = (self.on_time + self.off_time).as_nanos();
            let phase = next.saturating_sub(self.start).as_nanos() % period;
            if phase >= self.on_time.as_nanos() {
                let wait = (period - phase) as u64;
                next += Duration::from_nanos(wait);
            }
        }

        (next < self.stop).then_some(next)
    }

    pub fn record_tx(&mut self, bytes: u32) {
        self.tx_packets += 1;
        self.tx_bytes += bytes as u64;
    }
}

impl TrafficEndpoint for OnOffApp {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_rate_spec(&self) -> &str {
        &self.data_rate_spec
    }

    fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    fn set_data_rate(&mut self, spec: &str) -> Result<(), RateParseError> {
        self.data_rate = spec.parse()?;
        self.data_rate_spec = spec.to_string();
        Ok(())
    }
}

/// Counts UDP payload delivered to one port of one node.
#[derive(Debug, Clone, Serialize)]
pub struct PacketSink {
    pub node: NodeId,
    pub port: u16,
    pub rx_packets: u64,
    pub rx_bytes: u64,
}

impl PacketSink {
    pub fn new(node: NodeId, port: u16) -> Self {
        Self {
            node,
            port,
            rx_packets: 0,
            rx_bytes: 0,
        }
    }
}

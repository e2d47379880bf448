use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

pub const PROTOCOL_UDP: u8 = 17;

/// Opaque flow identifier handed out by the flow monitor, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub u32);

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow#{}", self.0)
    }
}

/// Classifier key for a transport flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiveTuple {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub src_port: u16,
    pub dst_port: u16,
}

impl fmt::Display for FiveTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{} (proto {})",
            self.src, self.src_port, self.dst, self.dst_port, self.protocol
        )
    }
}

/// Per-flow counters. Timestamps are simulated time since the run started.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    pub lost_packets: u64,
    /// Sum of one-way delays of every received packet.
    pub delay_sum: Duration,
    pub time_first_tx_packet: Duration,
    pub time_last_tx_packet: Duration,
    pub time_first_rx_packet: Duration,
    pub time_last_rx_packet: Duration,
}

/// Snapshot of every flow seen so far. Ordered by id so that reductions
/// over it are reproducible.
pub type FlowCollection = BTreeMap<FlowId, FlowRecord>;

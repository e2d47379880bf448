use crate::app::PacketSink;
use crate::channel::MediumStats;
use crate::topology::Node;
use iot_twin_abstract::{FiveTuple, FlowId, FlowRecord, TwinConfig};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FlowReport {
    pub id: FlowId,
    pub tuple: FiveTuple,
    pub record: FlowRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppSummary {
    pub name: String,
    pub data_rate: String,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: TwinConfig,
    pub stopped_at_s: f64,
    pub events_processed: u64,
    pub nodes: Vec<Node>,
    pub apps: Vec<AppSummary>,
    pub sinks: Vec<PacketSink>,
    pub medium: MediumStats,
    pub flows: Vec<FlowReport>,
}

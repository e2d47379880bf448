use crate::metrics::AggregateMetrics;
use iot_twin_abstract::{FlowCollection, FlowRecord};

/// Indicators of a single flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowPerformance {
    pub throughput_mbps: f64,
    pub packet_loss_percent: f64,
    pub delay_ms: f64,
}

impl FlowPerformance {
    /// Degenerate flows (no elapsed time, nothing sent, nothing received)
    /// contribute zero to the affected indicator.
    pub fn of(record: &FlowRecord) -> Self {
        let duration =
            record.time_last_rx_packet.as_secs_f64() - record.time_first_tx_packet.as_secs_f64();
        let throughput_mbps = if duration > 0.0 {
            record.rx_bytes as f64 * 8.0 / (1e6 * duration)
        } else {
            0.0
        };

        let packet_loss_percent = if record.tx_packets > 0 {
            (record.tx_packets as f64 - record.rx_packets as f64) / record.tx_packets as f64
                * 100.0
        } else {
            0.0
        };

        let delay_ms = if record.rx_packets > 0 {
            record.delay_sum.as_secs_f64() / record.rx_packets as f64 * 1000.0
        } else {
            0.0
        };

        Self {
            throughput_mbps,
            packet_loss_percent,
            delay_ms,
        }
    }
}

/// Reduce a flow snapshot to the arithmetic mean of each per-flow indicator.
/// An empty snapshot yields all zeros.
pub fn aggregate(flows: &FlowCollection, data_rate: &str) -> AggregateMetrics {
    let mut total_throughput = 0.0;
    let mut total_loss = 0.0;
    let mut total_delay = 0.0;

    for record in flows.values() {
        let perf = FlowPerformance::of(record);
        total_throughput += perf.throughput_mbps;
        total_loss += perf.packet_loss_percent;
        total_delay += perf.delay_ms;
    }

    let flow_count = flows.len();
    let mean = |total: f64| {
        if flow_count > 0 {
            total / flow_count as f64
        } else {
            0.0
        }
    };

    AggregateMetrics {
        avg_throughput_mbps: mean(total_throughput),
        avg_packet_loss_percent: mean(total_loss),
        avg_delay_ms: mean(total_delay),
        data_rate: data_rate.to_string(),
        flow_count,
    }
}

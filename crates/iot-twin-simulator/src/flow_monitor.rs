use iot_twin_abstract::{FiveTuple, FlowCollection, FlowId, FlowRecord, FlowStatsSource};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

/// Packets in flight longer than this are declared lost.
pub const DEFAULT_MAX_PER_HOP_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
struct InFlight {
    flow: FlowId,
    sent_at: Duration,
}

/// Classifies packets into flows by five-tuple and keeps per-flow counters.
#[derive(Debug)]
pub struct FlowMonitor {
    classifier: HashMap<FiveTuple, FlowId>,
    tuples: BTreeMap<FlowId, FiveTuple>,
    flows: FlowCollection,
    in_flight: HashMap<u64, InFlight>,
    max_per_hop_delay: Duration,
    clock: Duration,
}

impl Default for FlowMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_HOP_DELAY)
    }
}

impl FlowMonitor {
    pub fn new(max_per_hop_delay: Duration) -> Self {
        Self {
            classifier: HashMap::new(),
            tuples: BTreeMap::new(),
            flows: FlowCollection::new(),
            in_flight: HashMap::new(),
            max_per_hop_delay,
            clock: Duration::ZERO,
        }
    }

    /// Keep the monitor's notion of "now" in step with the engine.
    pub fn advance_to(&mut self, now: Duration) {
        self.clock = self.clock.max(now);
    }

    pub fn classify(&mut self, tuple: FiveTuple) -> FlowId {
        let next = FlowId(self.classifier.len() as u32 + 1);
        *self.classifier.entry(tuple).or_insert_with(|| {
            self.tuples.insert(next, tuple);
            next
        })
    }

    pub fn flow_tuple(&self, flow: FlowId) -> Option<&FiveTuple> {
        self.tuples.get(&flow)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn record_tx(&mut self, tuple: FiveTuple, uid: u64, bytes: u32, now: Duration) -> FlowId {
        self.advance_to(now);
        let flow = self.classify(tuple);
        let record = self.flows.entry(flow).or_default();
        if record.tx_packets == 0 {
            record.time_first_tx_packet = now;
        }
        record.time_last_tx_packet = now;
        record.tx_packets += 1;
        record.tx_bytes += bytes as u64;
        self.in_flight.insert(uid, InFlight { flow, sent_at: now });
        flow
    }

    pub fn record_rx(&mut self, uid: u64, bytes: u32, now: Duration) -> Option<FlowId> {
        self.advance_to(now);
        let Some(tracked) = self.in_flight.remove(&uid) else {
            debug!("Received untracked packet uid={}", uid);
            return None;
        };
        let record = self.flows.entry(tracked.flow).or_default();
        if record.rx_packets == 0 {
            record.time_first_rx_packet = now;
        }
        record.time_last_rx_packet = now;
        record.rx_packets += 1;
        record.rx_bytes += bytes as u64;
        record.delay_sum += now.saturating_sub(tracked.sent_at);
        Some(tracked.flow)
    }

    pub fn record_drop(&mut self, uid: u64) {
        if let Some(tracked) = self.in_flight.remove(&uid) {
            self.flows.entry(tracked.flow).or_default().lost_packets += 1;
        }
    }
}

impl FlowStatsSource for FlowMonitor {
    fn check_for_lost_packets(&mut self) {
        let now = self.clock;
        let max_delay = self.max_per_hop_delay;
        let expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, p)| now.saturating_sub(p.sent_at) > max_delay)
            .map(|(uid, _)| *uid)
            .collect();
        for uid in expired {
            self.record_drop(uid);
        }
    }

    fn flow_stats(&self) -> FlowCollection {
        self.flows.clone()
    }
}

use crate::app::{OnOffApp, OnOffConfig, PacketSink};
use crate::channel::{Transmission, WirelessMedium};
use crate::flow_monitor::FlowMonitor;
use crate::topology::{GridLayout, Node, NodeId, host_address};
use crate::trace::{AppSummary, FlowReport, RunReport};
use anyhow::{Context, bail};
use iot_twin_abstract::{
    AppId, FiveTuple, FlowId, FlowStatsSource, PROTOCOL_UDP, ScheduledCallback,
    SimulationContext, Timeline, TrafficEndpoint, TwinConfig,
};
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// IPv4 (20) + UDP (8) header bytes added to every application payload.
pub const IPV4_UDP_HEADER_BYTES: u32 = 28;

const FIRST_EPHEMERAL_PORT: u16 = 49153;

#[derive(Debug, Clone)]
pub struct Packet {
    pub uid: u64,
    pub flow: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
    pub dst_port: u16,
    /// Size on the wire, headers included.
    pub size: u32,
}

pub enum EventType {
    AppStart { app: AppId },
    AppSend { app: AppId },
    AppStop { app: AppId },
    PacketArrival { packet: Packet },
    Callback { callback: ScheduledCallback },
    Stop,
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::AppStart { app } => write!(f, "AppStart({})", app.0),
            EventType::AppSend { app } => write!(f, "AppSend({})", app.0),
            EventType::AppStop { app } => write!(f, "AppStop({})", app.0),
            EventType::PacketArrival { packet } => {
                write!(f, "PacketArrival(uid={}, {})", packet.uid, packet.flow)
            }
            EventType::Callback { .. } => write!(f, "Callback"),
            EventType::Stop => write!(f, "Stop"),
        }
    }
}

#[derive(Debug)]
struct Event {
    time: Duration,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Context handed to a scheduled callback.
struct ScopedContext<'a> {
    monitor: &'a mut FlowMonitor,
    now: Duration,
    stop_requested: bool,
}

impl<'a> SimulationContext for ScopedContext<'a> {
    fn now(&self) -> Duration {
        self.now
    }

    fn flow_stats(&mut self) -> &mut dyn FlowStatsSource {
        &mut *self.monitor
    }

    fn stop(&mut self) {
        self.stop_requested = true;
    }
}

/// Discrete-event simulation of a single-cell wireless network carrying UDP
/// traffic from stations to their peers.
pub struct Simulator {
    time: Duration,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: TwinConfig,
    rng: rand::rngs::StdRng,

    nodes: Vec<Node>,
    apps: Vec<OnOffApp>,
    sinks: Vec<PacketSink>,
    medium: WirelessMedium,
    flow_monitor: FlowMonitor,

    next_packet_uid: u64,
    stopped: bool,
    events_processed: u64,
}

impl Simulator {
    pub fn new(config: TwinConfig) -> Self {
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);
        let medium = WirelessMedium::new(&config.channel);

        Self {
            time: Duration::ZERO,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            nodes: Vec::new(),
            apps: Vec::new(),
            sinks: Vec::new(),
            medium,
            flow_monitor: FlowMonitor::default(),
            next_packet_uid: 0,
            stopped: false,
            events_processed: 0,
        }
    }

    /// Create `count` nodes placed on `layout`, addressed 10.1.1.1 onwards.
    pub fn create_nodes(&mut self, count: u32, layout: &GridLayout) -> Vec<NodeId> {
        (0..count)
            .map(|_| {
                let index = self.nodes.len() as u32;
                let id = NodeId(index);
                self.nodes.push(Node {
                    id,
                    address: host_address(index),
                    position: layout.position(index),
                });
                id
            })
            .collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn install_on_off(&mut self, config: OnOffConfig) -> anyhow::Result<AppId> {
        if self.node(config.node).is_none() {
            bail!("Unknown source node {:?} for app {}", config.node, config.name);
        }
        if self.node(config.remote).is_none() {
            bail!("Unknown remote node {:?} for app {}", config.remote, config.name);
        }

        let id = AppId(self.apps.len());
        let local_port = FIRST_EPHEMERAL_PORT + id.0 as u16;
        let name = config.name.clone();
        let app = OnOffApp::new(config, local_port)
            .with_context(|| format!("Invalid data rate for app {}", name))?;

        self.push_event(app.start, EventType::AppStart { app: id });
        self.push_event(app.stop, EventType::AppStop { app: id });
        self.apps.push(app);
        Ok(id)
    }

    pub fn install_sink(&mut self, node: NodeId, port: u16) -> anyhow::Result<usize> {
        if self.node(node).is_none() {
            bail!("Unknown sink node {:?}", node);
        }
        self.sinks.push(PacketSink::new(node, port));
        Ok(self.sinks.len() - 1)
    }

    pub fn app(&self, id: AppId) -> Option<&OnOffApp> {
        self.apps.get(id.0)
    }

    pub fn endpoint_mut(&mut self, id: AppId) -> Option<&mut dyn TrafficEndpoint> {
        self.apps
            .get_mut(id.0)
            .map(|app| app as &mut dyn TrafficEndpoint)
    }

    pub fn sinks(&self) -> &[PacketSink] {
        &self.sinks
    }

    pub fn flow_monitor(&self) -> &FlowMonitor {
        &self.flow_monitor
    }

    pub fn flow_monitor_mut(&mut self) -> &mut FlowMonitor {
        &mut self.flow_monitor
    }

    /// Expose current simulation config (for diagnostics)
    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    pub fn current_time(&self) -> Duration {
        self.time
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn peek_next_event_time(&self) -> Option<Duration> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    fn push_event(&mut self, time: Duration, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    /// Process the next event. Returns false once the run is stopped or the
    /// queue is empty; an error from a scheduled callback aborts the run.
    pub fn step(&mut self) -> anyhow::Result<bool> {
        if self.stopped {
            return Ok(false);
        }
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return Ok(false),
        };

        self.time = event.time;
        self.flow_monitor.advance_to(self.time);
        self.events_processed += 1;
        debug!("Processing event at {:?}: {:?}", self.time, event.event_type);

        match event.event_type {
            EventType::AppStart { app } => {
                if let Some(a) = self.apps.get_mut(app.0) {
                    a.running = true;
                    let first = a.next_send_after(self.time);
                    if let Some(at) = first {
                        self.push_event(at, EventType::AppSend { app });
                    }
                }
            }
            EventType::AppSend { app } => self.send_from(app),
            EventType::AppStop { app } => {
                if let Some(a) = self.apps.get_mut(app.0) {
                    a.running = false;
                }
            }
            EventType::PacketArrival { packet } => self.deliver(packet),
            EventType::Callback { callback } => {
                let mut ctx = ScopedContext {
                    monitor: &mut self.flow_monitor,
                    now: self.time,
                    stop_requested: false,
                };
                callback(&mut ctx)?;
                if ctx.stop_requested {
                    info!("Run stopped by callback at {:?}", self.time);
                    self.stopped = true;
                }
            }
            EventType::Stop => {
                info!("Nominal end of run reached at {:?}", self.time);
                self.stopped = true;
            }
        }
        Ok(true)
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        while self.step()? {}
        info!(
            "Simulation finished at {:?} after {} events",
            self.time, self.events_processed
        );
        Ok(())
    }

    fn send_from(&mut self, app_id: AppId) {
        let Some(app) = self.apps.get(app_id.0) else {
            return;
        };
        if !app.running {
            return;
        }
        let (src, dst) = (app.node, app.remote);
        let (src_port, dst_port) = (app.local_port, app.remote_port);
        let size = app.packet_size + IPV4_UDP_HEADER_BYTES;
        let next = app.next_send_after(self.time);

        let (src_node, dst_node) = (&self.nodes[src.0 as usize], &self.nodes[dst.0 as usize]);
        let tuple = FiveTuple {
            src: src_node.address,
            dst: dst_node.address,
            protocol: PROTOCOL_UDP,
            src_port,
            dst_port,
        };
        let propagation = src_node.position.propagation_delay(&dst_node.position);

        let uid = self.next_packet_uid;
        self.next_packet_uid += 1;
        let flow = self.flow_monitor.record_tx(tuple, uid, size, self.time);
        self.apps[app_id.0].record_tx(size);

        match self.medium.transmit(self.time, size, &mut self.rng) {
            Transmission::Dropped(reason) => {
                debug!("Packet uid={} of {} dropped: {:?}", uid, flow, reason);
                self.flow_monitor.record_drop(uid);
            }
            Transmission::Sent { departure, latency } => {
                let packet = Packet {
                    uid,
                    flow,
                    src,
                    dst,
                    dst_port,
                    size,
                };
                self.push_event(
                    departure + latency + propagation,
                    EventType::PacketArrival { packet },
                );
            }
        }

        if let Some(at) = next {
            self.push_event(at, EventType::AppSend { app: app_id });
        }
    }

    fn deliver(&mut self, packet: Packet) {
        self.flow_monitor.record_rx(packet.uid, packet.size, self.time);
        if let Some(sink) = self
            .sinks
            .iter_mut()
            .find(|s| s.node == packet.dst && s.port == packet.dst_port)
        {
            sink.rx_packets += 1;
            sink.rx_bytes += packet.size.saturating_sub(IPV4_UDP_HEADER_BYTES) as u64;
        }
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> RunReport {
        let flows = self
            .flow_monitor
            .flow_stats()
            .into_iter()
            .filter_map(|(id, record)| {
                self.flow_monitor
                    .flow_tuple(id)
                    .map(|tuple| FlowReport {
                        id,
                        tuple: *tuple,
                        record,
                    })
            })
            .collect();

        RunReport {
            config: self.config.clone(),
            stopped_at_s: self.time.as_secs_f64(),
            events_processed: self.events_processed,
            nodes: self.nodes.clone(),
            apps: self
                .apps
                .iter()
                .map(|app| AppSummary {
                    name: app.name().to_string(),
                    data_rate: app.data_rate_spec().to_string(),
                    tx_packets: app.tx_packets,
                    tx_bytes: app.tx_bytes,
                })
                .collect(),
            sinks: self.sinks.clone(),
            medium: self.medium.stats.clone(),
            flows,
        }
    }
}

impl Timeline for Simulator {
    fn now(&self) -> Duration {
        self.time
    }

    fn schedule_at(&mut self, at: Duration, callback: ScheduledCallback) {
        self.push_event(at, EventType::Callback { callback });
    }

    fn stop_at(&mut self, at: Duration) {
        self.push_event(at, EventType::Stop);
    }
}

pub mod app;
pub mod channel;
pub mod engine;
pub mod flow_monitor;
pub mod smart_home;
pub mod topology;
pub mod trace;

pub use app::{OnOffApp, OnOffConfig, PacketSink};
pub use engine::{IPV4_UDP_HEADER_BYTES, Simulator};
pub use flow_monitor::FlowMonitor;
pub use smart_home::SmartHome;
pub use topology::{GridLayout, NodeId};
pub use trace::RunReport;

pub mod config;
pub mod flow;
pub mod interface;
pub mod rate;
pub mod scenario;

pub use config::{ChannelConfig, ConfigError, TwinConfig};
pub use flow::{FiveTuple, FlowCollection, FlowId, FlowRecord, PROTOCOL_UDP};
pub use interface::{
    AppId, FlowStatsSource, ScheduledCallback, SimulationContext, Timeline, TrafficEndpoint,
};
pub use rate::{DataRate, RateParseError};
pub use scenario::{ChannelOverride, TwinConfigOverride};

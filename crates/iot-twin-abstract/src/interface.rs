use crate::flow::FlowCollection;
use crate::rate::{DataRate, RateParseError};
use std::time::Duration;

/// Handle to a traffic application installed in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppId(pub usize);

/// The flow-tracking subsystem of the simulation engine.
pub trait FlowStatsSource {
    /// Reconcile packets still in flight before statistics are read.
    fn check_for_lost_packets(&mut self);

    /// Owned snapshot of every flow observed so far.
    fn flow_stats(&self) -> FlowCollection;
}

/// What a scheduled callback can see and do while the engine is paused on it.
pub trait SimulationContext {
    /// Current simulated time.
    fn now(&self) -> Duration;

    fn flow_stats(&mut self) -> &mut dyn FlowStatsSource;

    /// Halt the run once the current callback returns.
    fn stop(&mut self);
}

pub type ScheduledCallback = Box<dyn FnOnce(&mut dyn SimulationContext) -> anyhow::Result<()>>;

/// Run control offered by the engine: one-shot callbacks at absolute
/// simulated times, and the nominal end of the run.
pub trait Timeline {
    fn now(&self) -> Duration;

    /// Arm `callback` to run once at simulated time `at`.
    fn schedule_at(&mut self, at: Duration, callback: ScheduledCallback);

    /// Arm the nominal end of the run.
    fn stop_at(&mut self, at: Duration);
}

/// A traffic generator whose output rate can be configured before the run.
pub trait TrafficEndpoint {
    fn name(&self) -> &str;

    /// The rate string last applied, exactly as given.
    fn data_rate_spec(&self) -> &str;

    fn data_rate(&self) -> DataRate;

    /// Parse and apply a rate string. Malformed strings are rejected and
    /// leave the previous rate in place.
    fn set_data_rate(&mut self, spec: &str) -> Result<(), RateParseError>;
}

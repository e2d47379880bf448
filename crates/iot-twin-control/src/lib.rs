//! Closed-loop rate control for the smart-home digital twin.
//!
//! One process performs one iteration of the loop:
//!
//! 1. [`action`] reads the rate decided by the external controller.
//! 2. [`traffic`] applies it to the controlled traffic source.
//! 3. The simulation runs until [`scheduler`] fires shortly before its end.
//! 4. [`aggregator`] reduces the flow statistics, [`sink`] appends them to
//!    the metrics log, and the run is halted.
//!
//! The controller then reads the log, writes the next action and starts a
//! fresh process. It must not read the action store before writing it, and
//! must not write a new action before the metrics log has a fresh entry.

pub mod action;
pub mod aggregator;
pub mod context;
pub mod error;
pub mod iteration;
pub mod metrics;
pub mod scheduler;
pub mod sink;
pub mod traffic;

pub use action::{Action, ActionSource, FileActionSource, write_action};
pub use aggregator::{FlowPerformance, aggregate};
pub use context::{ControlLoopContext, IterationBudget, MAX_ITERATIONS_PER_PROCESS};
pub use error::ControlError;
pub use iteration::{IterationOutcome, run_file_iteration, run_iteration};
pub use metrics::{AggregateMetrics, MetricsLogEntry, format_number};
pub use scheduler::{FeedbackLoopScheduler, LoopState};
pub use sink::{FileMetricsSink, MetricsSink, read_latest_metrics};
pub use traffic::{EndpointRegistry, TrafficController};

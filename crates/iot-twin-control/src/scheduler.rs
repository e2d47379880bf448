use crate::aggregator::aggregate;
use crate::error::ControlError;
use crate::metrics::{AggregateMetrics, MetricsLogEntry, format_number};
use crate::sink::MetricsSink;
use iot_twin_abstract::{SimulationContext, Timeline};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Simulation advancing, feedback not yet triggered.
    Running,
    /// Feedback callback fired: flow stats are being reduced and logged.
    Aggregating,
    /// Metrics logged and the run halted. Terminal.
    Stopped,
}

#[derive(Debug)]
struct Shared {
    state: LoopState,
    metrics: Option<AggregateMetrics>,
    fired_at: Option<Duration>,
    cycles: u32,
}

/// Arms the single end-of-run feedback callback: pull flow stats, reduce
/// them, append one metrics line, halt the run.
pub struct FeedbackLoopScheduler {
    total: Duration,
    lookback: Duration,
    armed: bool,
    shared: Rc<RefCell<Shared>>,
}

impl FeedbackLoopScheduler {
    pub fn new(total: Duration, lookback: Duration) -> Result<Self, ControlError> {
        if lookback.is_zero() || lookback >= total {
            return Err(ControlError::InvalidSchedule { total, lookback });
        }
        Ok(Self {
            total,
            lookback,
            armed: false,
            shared: Rc::new(RefCell::new(Shared {
                state: LoopState::Running,
                metrics: None,
                fired_at: None,
                cycles: 0,
            })),
        })
    }

    /// Simulated time at which aggregation fires.
    pub fn trigger_time(&self) -> Duration {
        self.total - self.lookback
    }

    pub fn state(&self) -> LoopState {
        self.shared.borrow().state
    }

    pub fn metrics(&self) -> Option<AggregateMetrics> {
        self.shared.borrow().metrics.clone()
    }

    pub fn fired_at(&self) -> Option<Duration> {
        self.shared.borrow().fired_at
    }

    /// Aggregation cycles completed so far; never more than one.
    pub fn cycles(&self) -> u32 {
        self.shared.borrow().cycles
    }

    /// Arm the one-shot callback on `timeline`. `data_rate` is the rate in
    /// effect for the controlled endpoint and is logged with the metrics.
    pub fn arm(
        &mut self,
        timeline: &mut dyn Timeline,
        mut sink: Box<dyn MetricsSink>,
        data_rate: String,
    ) -> Result<Duration, ControlError> {
        if self.armed {
            return Err(ControlError::AlreadyArmed);
        }
        self.armed = true;

        let at = self.trigger_time();
        let shared = Rc::clone(&self.shared);
        timeline.schedule_at(
            at,
            Box::new(move |ctx: &mut dyn SimulationContext| -> anyhow::Result<()> {
                shared.borrow_mut().state = LoopState::Aggregating;

                let source = ctx.flow_stats();
                source.check_for_lost_packets();
                let flows = source.flow_stats();
                let metrics = aggregate(&flows, &data_rate);

                info!(
                    "Average Throughput: {} Mbps",
                    format_number(metrics.avg_throughput_mbps)
                );
                info!(
                    "Average Packet Loss: {}%",
                    format_number(metrics.avg_packet_loss_percent)
                );
                info!("Average Delay: {} ms", format_number(metrics.avg_delay_ms));

                sink.append(&MetricsLogEntry::from(&metrics))?;

                {
                    let mut shared = shared.borrow_mut();
                    shared.metrics = Some(metrics);
                    shared.fired_at = Some(ctx.now());
                    shared.cycles += 1;
                    shared.state = LoopState::Stopped;
                }
                ctx.stop();
                Ok(())
            }),
        );

        info!("Feedback armed for {:?} (run length {:?})", at, self.total);
        Ok(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iot_twin_abstract::{
        FlowCollection, FlowId, FlowRecord, FlowStatsSource, ScheduledCallback,
    };

    struct FixedFlows {
        flows: FlowCollection,
        reconciled: bool,
    }

    impl FlowStatsSource for FixedFlows {
        fn check_for_lost_packets(&mut self) {
            self.reconciled = true;
        }

        fn flow_stats(&self) -> FlowCollection {
            self.flows.clone()
        }
    }

    /// Minimal timeline: fires every callback due before the nominal end
    /// (or until one of them stops the run).
    struct FakeTimeline {
        now: Duration,
        end: Option<Duration>,
        callbacks: Vec<(Duration, ScheduledCallback)>,
        source: FixedFlows,
        stopped: bool,
    }

    impl FakeTimeline {
        fn new(flows: FlowCollection) -> Self {
            Self {
                now: Duration::ZERO,
                end: None,
                callbacks: Vec::new(),
                source: FixedFlows {
                    flows,
                    reconciled: false,
                },
                stopped: false,
            }
        }

        fn run(&mut self) -> anyhow::Result<()> {
            self.callbacks.sort_by_key(|(at, _)| *at);
            for (at, callback) in std::mem::take(&mut self.callbacks) {
                if self.stopped || self.end.is_some_and(|end| at >= end) {
                    break;
                }
                self.now = at;
                callback(self)?;
            }
            if !self.stopped {
                self.now = self.end.unwrap_or(self.now);
                self.stopped = true;
            }
            Ok(())
        }
    }

    impl Timeline for FakeTimeline {
        fn now(&self) -> Duration {
            self.now
        }

        fn schedule_at(&mut self, at: Duration, callback: ScheduledCallback) {
            self.callbacks.push((at, callback));
        }

        fn stop_at(&mut self, at: Duration) {
            self.end = Some(at);
        }
    }

    impl SimulationContext for FakeTimeline {
        fn now(&self) -> Duration {
            self.now
        }

        fn flow_stats(&mut self) -> &mut dyn FlowStatsSource {
            &mut self.source
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink(Rc<RefCell<Vec<String>>>);

    impl MetricsSink for MemorySink {
        fn append(&mut self, entry: &MetricsLogEntry) -> Result<(), ControlError> {
            self.0.borrow_mut().push(entry.to_string());
            Ok(())
        }
    }

    struct BrokenSink;

    impl MetricsSink for BrokenSink {
        fn append(&mut self, _entry: &MetricsLogEntry) -> Result<(), ControlError> {
            Err(ControlError::MetricsAppend {
                path: "metrics.txt".into(),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            })
        }
    }

    fn one_flow() -> FlowCollection {
        let record = FlowRecord {
            tx_packets: 100,
            rx_packets: 95,
            rx_bytes: 950_000,
            delay_sum: Duration::from_millis(950),
            time_first_tx_packet: Duration::from_secs(1),
            time_last_rx_packet: Duration::from_secs(2),
            ..Default::default()
        };
        FlowCollection::from([(FlowId(1), record)])
    }

    #[test]
    fn lookback_must_fit_inside_the_run() {
        let secs = Duration::from_secs;
        assert!(FeedbackLoopScheduler::new(secs(60), secs(5)).is_ok());
        assert!(matches!(
            FeedbackLoopScheduler::new(secs(60), Duration::ZERO),
            Err(ControlError::InvalidSchedule { .. })
        ));
        assert!(matches!(
            FeedbackLoopScheduler::new(secs(5), secs(5)),
            Err(ControlError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn fires_once_at_trigger_time_then_stops() {
        let mut timeline = FakeTimeline::new(one_flow());
        timeline.stop_at(Duration::from_secs(60));
        let sink = MemorySink::default();

        let mut scheduler =
            FeedbackLoopScheduler::new(Duration::from_secs(60), Duration::from_secs(5)).unwrap();
        assert_eq!(scheduler.state(), LoopState::Running);
        let at = scheduler
            .arm(&mut timeline, Box::new(sink.clone()), "3Mbps".into())
            .unwrap();
        assert_eq!(at, Duration::from_secs(55));

        timeline.run().unwrap();

        assert_eq!(scheduler.state(), LoopState::Stopped);
        assert_eq!(scheduler.fired_at(), Some(Duration::from_secs(55)));
        assert_eq!(scheduler.cycles(), 1);
        assert!(timeline.source.reconciled);
        assert!(timeline.stopped);
        assert_eq!(timeline.now, Duration::from_secs(55));
        assert_eq!(sink.0.borrow().as_slice(), ["7.6 10 5 3Mbps".to_string()]);
    }

    #[test]
    fn cannot_be_armed_twice() {
        let mut timeline = FakeTimeline::new(FlowCollection::new());
        let mut scheduler =
            FeedbackLoopScheduler::new(Duration::from_secs(60), Duration::from_secs(5)).unwrap();
        scheduler
            .arm(&mut timeline, Box::new(MemorySink::default()), String::new())
            .unwrap();
        let err = scheduler
            .arm(&mut timeline, Box::new(MemorySink::default()), String::new())
            .unwrap_err();
        assert!(matches!(err, ControlError::AlreadyArmed));
        assert_eq!(timeline.callbacks.len(), 1);
    }

    #[test]
    fn sink_failure_aborts_without_stopping_cleanly() {
        let mut timeline = FakeTimeline::new(one_flow());
        let mut scheduler =
            FeedbackLoopScheduler::new(Duration::from_secs(60), Duration::from_secs(5)).unwrap();
        scheduler
            .arm(&mut timeline, Box::new(BrokenSink), "3Mbps".into())
            .unwrap();

        assert!(timeline.run().is_err());
        assert_eq!(scheduler.state(), LoopState::Aggregating);
        assert_eq!(scheduler.cycles(), 0);
        assert!(scheduler.metrics().is_none());
    }
}

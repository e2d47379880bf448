use iot_twin_abstract::{ChannelConfig, DataRate};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    QueueFull,
    Channel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Dropped(DropReason),
    /// The packet leaves the radio at `departure` and reaches the receiver
    /// `latency` later (before propagation).
    Sent { departure: Duration, latency: Duration },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MediumStats {
    pub transmitted: u64,
    pub dropped_queue_full: u64,
    pub dropped_channel: u64,
}

/// Shared half-duplex radio medium: one FIFO, one packet on the air at a time.
pub struct WirelessMedium {
    capacity: DataRate,
    queue_limit: usize,
    loss_rate: f64,
    min_latency: Duration,
    max_latency: Duration,
    departures: VecDeque<Duration>,
    busy_until: Duration,
    pub stats: MediumStats,
}

impl WirelessMedium {
    pub fn new(config: &ChannelConfig) -> Self {
        let (lo, hi) = if config.min_latency_us <= config.max_latency_us {
            (config.min_latency_us, config.max_latency_us)
        } else {
            (config.max_latency_us, config.min_latency_us)
        };
        Self {
            capacity: DataRate::from_bps(config.capacity_bps),
            queue_limit: config.queue_limit,
            loss_rate: config.loss_rate,
            min_latency: Duration::from_micros(lo),
            max_latency: Duration::from_micros(hi),
            departures: VecDeque::new(),
            busy_until: Duration::ZERO,
            stats: MediumStats::default(),
        }
    }

    /// Packets accepted but not yet fully on the air at `now`.
    pub fn backlog(&mut self, now: Duration) -> usize {
        while self.departures.front().is_some_and(|d| *d <= now) {
            self.departures.pop_front();
        }
        self.departures.len()
    }

    /// Offer a packet of `bytes` to the medium at `now`. A zero capacity
    /// disables serialization delay.
    pub fn transmit<R: Rng>(&mut self, now: Duration, bytes: u32, rng: &mut R) -> Transmission {
        if self.backlog(now) >= self.queue_limit {
            self.stats.dropped_queue_full += 1;
            return Transmission::Dropped(DropReason::QueueFull);
        }

        let airtime = self.capacity.transmission_time(bytes).unwrap_or(Duration::ZERO);
        let departure = now.max(self.busy_until) + airtime;
        self.busy_until = departure;
        self.departures.push_back(departure);

        if rng.random::<f64>() < self.loss_rate {
            self.stats.dropped_channel += 1;
            return Transmission::Dropped(DropReason::Channel);
        }

        let latency = Duration::from_nanos(rng.random_range(
            self.min_latency.as_nanos() as u64..=self.max_latency.as_nanos() as u64,
        ));
        self.stats.transmitted += 1;
        Transmission::Sent { departure, latency }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn medium(capacity_bps: u64, queue_limit: usize, loss_rate: f64) -> WirelessMedium {
        WirelessMedium::new(&ChannelConfig {
            capacity_bps,
            queue_limit,
            loss_rate,
            min_latency_us: 100,
            max_latency_us: 100,
        })
    }

    #[test]
    fn packets_are_serialized_back_to_back() {
        let mut rng = StdRng::seed_from_u64(7);
        // 1000 bytes at 8 Mbit/s = 1 ms of airtime
        let mut medium = medium(8_000_000, 10, 0.0);
        let first = medium.transmit(Duration::ZERO, 1000, &mut rng);
        let second = medium.transmit(Duration::ZERO, 1000, &mut rng);

        assert_eq!(
            first,
            Transmission::Sent {
                departure: Duration::from_millis(1),
                latency: Duration::from_micros(100)
            }
        );
        assert_eq!(
            second,
            Transmission::Sent {
                departure: Duration::from_millis(2),
                latency: Duration::from_micros(100)
            }
        );
    }

    #[test]
    fn full_queue_drops_new_arrivals() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut medium = medium(8_000_000, 2, 0.0);
        medium.transmit(Duration::ZERO, 1000, &mut rng);
        medium.transmit(Duration::ZERO, 1000, &mut rng);
        let third = medium.transmit(Duration::ZERO, 1000, &mut rng);

        assert_eq!(third, Transmission::Dropped(DropReason::QueueFull));
        assert_eq!(medium.stats.dropped_queue_full, 1);

        // once the first packet has left, there is room again
        assert_eq!(medium.backlog(Duration::from_millis(1)), 1);
    }

    #[test]
    fn certain_loss_drops_everything() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut medium = medium(8_000_000, 10, 1.0);
        for _ in 0..5 {
            assert_eq!(
                medium.transmit(Duration::ZERO, 100, &mut rng),
                Transmission::Dropped(DropReason::Channel)
            );
        }
        assert_eq!(medium.stats.dropped_channel, 5);
        assert_eq!(medium.stats.transmitted, 0);
    }
}

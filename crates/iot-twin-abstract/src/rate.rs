use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateParseError {
    #[error("empty data rate string")]
    Empty,
    #[error("invalid magnitude in data rate {0:?}")]
    Magnitude(String),
    #[error("unknown data rate unit {unit:?} in {input:?}")]
    Unit { input: String, unit: String },
    #[error("data rate {input:?} exceeds the supported maximum of {max}")]
    TooFast { input: String, max: DataRate },
}

/// A transmission rate in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DataRate(u64);

impl DataRate {
    pub const ZERO: DataRate = DataRate(0);
    /// Highest rate a string may name: 100 Gbps.
    pub const MAX: DataRate = DataRate(100_000_000_000);

    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    pub fn bps(&self) -> u64 {
        self.0
    }

    /// Time needed to push `bytes` onto a link running at this rate,
    /// rounded up to whole nanoseconds. `None` for a zero rate.
    pub fn transmission_time(&self, bytes: u32) -> Option<std::time::Duration> {
        if self.0 == 0 {
            return None;
        }
        let nanos = (bytes as u128 * 8 * 1_000_000_000).div_ceil(self.0 as u128);
        Some(std::time::Duration::from_nanos(nanos as u64))
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    const K: f64 = 1e3;
    const M: f64 = 1e6;
    const G: f64 = 1e9;
    const KI: f64 = 1024.0;
    const MI: f64 = 1024.0 * 1024.0;
    const GI: f64 = 1024.0 * 1024.0 * 1024.0;

    let multiplier = match unit {
        "bps" | "b/s" => 1.0,
        "Bps" | "B/s" => 8.0,
        "kbps" | "Kbps" | "kb/s" | "Kb/s" => K,
        "kBps" | "KBps" | "kB/s" | "KB/s" => 8.0 * K,
        "Kibps" | "Kib/s" => KI,
        "KiBps" | "KiB/s" => 8.0 * KI,
        "Mbps" | "Mb/s" => M,
        "MBps" | "MB/s" => 8.0 * M,
        "Mibps" | "Mib/s" => MI,
        "MiBps" | "MiB/s" => 8.0 * MI,
        "Gbps" | "Gb/s" => G,
        "GBps" | "GB/s" => 8.0 * G,
        "Gibps" | "Gib/s" => GI,
        "GiBps" | "GiB/s" => 8.0 * GI,
        _ => return None,
    };
    Some(multiplier)
}

impl FromStr for DataRate {
    type Err = RateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RateParseError::Empty);
        }

        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (magnitude, unit) = s.split_at(split);

        if unit.is_empty() {
            // A bare number is already in bits per second.
            let bps = magnitude
                .parse::<u64>()
                .map_err(|_| RateParseError::Magnitude(s.to_string()))?;
            return checked(s, bps as f64);
        }

        let value: f64 = magnitude
            .parse()
            .map_err(|_| RateParseError::Magnitude(s.to_string()))?;
        let multiplier = unit_multiplier(unit).ok_or_else(|| RateParseError::Unit {
            input: s.to_string(),
            unit: unit.to_string(),
        })?;

        checked(s, (value * multiplier).round())
    }
}

fn checked(input: &str, bps: f64) -> Result<DataRate, RateParseError> {
    if bps > DataRate::MAX.0 as f64 {
        return Err(RateParseError::TooFast {
            input: input.to_string(),
            max: DataRate::MAX,
        });
    }
    Ok(DataRate(bps as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_si_bit_units() {
        assert_eq!("5Mbps".parse::<DataRate>().unwrap().bps(), 5_000_000);
        assert_eq!("500kbps".parse::<DataRate>().unwrap().bps(), 500_000);
        assert_eq!("2Gb/s".parse::<DataRate>().unwrap().bps(), 2_000_000_000);
        assert_eq!("1.5Mbps".parse::<DataRate>().unwrap().bps(), 1_500_000);
    }

    #[test]
    fn parses_byte_and_binary_units() {
        assert_eq!("1KBps".parse::<DataRate>().unwrap().bps(), 8_000);
        assert_eq!("1Kibps".parse::<DataRate>().unwrap().bps(), 1_024);
        assert_eq!("1MiBps".parse::<DataRate>().unwrap().bps(), 8 * 1024 * 1024);
    }

    #[test]
    fn bare_number_is_bits_per_second() {
        assert_eq!("9600".parse::<DataRate>().unwrap().bps(), 9_600);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!("".parse::<DataRate>(), Err(RateParseError::Empty));
        assert!(matches!(
            "5Mbit".parse::<DataRate>(),
            Err(RateParseError::Unit { .. })
        ));
        assert!(matches!(
            "Mbps".parse::<DataRate>(),
            Err(RateParseError::Magnitude(_))
        ));
        assert!(matches!(
            "1.2.3Mbps".parse::<DataRate>(),
            Err(RateParseError::Magnitude(_))
        ));
    }

    #[test]
    fn transmission_time_of_a_full_packet() {
        let rate = DataRate::from_bps(8_000_000);
        assert_eq!(rate.transmission_time(1000), Some(Duration::from_millis(1)));
        assert_eq!(DataRate::ZERO.transmission_time(1000), None);
    }

    #[test]
    fn sub_nanosecond_transmission_rounds_up() {
        assert_eq!(
            DataRate::MAX.transmission_time(1),
            Some(Duration::from_nanos(1))
        );
        // 1024 bytes at 100 Gbps is 81.92 ns
        assert_eq!(
            DataRate::MAX.transmission_time(1024),
            Some(Duration::from_nanos(82))
        );
    }

    #[test]
    fn rates_beyond_the_maximum_are_rejected() {
        assert_eq!("100Gbps".parse::<DataRate>(), Ok(DataRate::MAX));
        assert!(matches!(
            "10000Gbps".parse::<DataRate>(),
            Err(RateParseError::TooFast { .. })
        ));
        assert!(matches!(
            "100000000001".parse::<DataRate>(),
            Err(RateParseError::TooFast { .. })
        ));
    }

    #[test]
    fn displays_in_bits_per_second() {
        assert_eq!("3Mbps".parse::<DataRate>().unwrap().to_string(), "3000000bps");
    }
}

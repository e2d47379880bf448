use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Network-wide indicators reduced from one flow snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateMetrics {
    pub avg_throughput_mbps: f64,
    pub avg_packet_loss_percent: f64,
    pub avg_delay_ms: f64,
    /// Rate of the controlled endpoint while the flows were observed.
    pub data_rate: String,
    pub flow_count: usize,
}

/// One line of the metrics log:
/// `<throughput_mbps> <avg_delay_ms> <packet_loss_percent> <data_rate>`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsLogEntry {
    pub throughput_mbps: f64,
    pub avg_delay_ms: f64,
    pub packet_loss_percent: f64,
    pub data_rate: String,
}

impl From<&AggregateMetrics> for MetricsLogEntry {
    fn from(metrics: &AggregateMetrics) -> Self {
        Self {
            throughput_mbps: metrics.avg_throughput_mbps,
            avg_delay_ms: metrics.avg_delay_ms,
            // The log carries loss as a whole percentage.
            packet_loss_percent: metrics.avg_packet_loss_percent.trunc(),
            data_rate: metrics.data_rate.clone(),
        }
    }
}

impl fmt::Display for MetricsLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            format_number(self.throughput_mbps),
            format_number(self.avg_delay_ms),
            format_number(self.packet_loss_percent),
            self.data_rate
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryParseError {
    #[error("expected 3 or 4 fields, found {0}")]
    FieldCount(usize),
    #[error("field {field} is not a number: {value:?}")]
    Number { field: &'static str, value: String },
}

impl FromStr for MetricsLogEntry {
    type Err = EntryParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if !(3..=4).contains(&fields.len()) {
            return Err(EntryParseError::FieldCount(fields.len()));
        }

        let number = |field: &'static str, value: &str| {
            value.parse::<f64>().map_err(|_| EntryParseError::Number {
                field,
                value: value.to_string(),
            })
        };

        Ok(Self {
            throughput_mbps: number("throughput", fields[0])?,
            avg_delay_ms: number("delay", fields[1])?,
            packet_loss_percent: number("packet_loss", fields[2])?,
            data_rate: fields.get(3).map(|s| s.to_string()).unwrap_or_default(),
        })
    }
}

const SIGNIFICANT_DIGITS: i32 = 6;

/// Render a number the way a default-configured C++ output stream does:
/// six significant digits, `%g` notation, no trailing zeros.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

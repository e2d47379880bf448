use iot_twin_abstract::{AppId, RateParseError};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::metrics::EntryParseError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("cannot read action store {path}: {source}")]
    ActionStoreUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("action store {path} holds no data rate")]
    ActionStoreEmpty { path: PathBuf },

    #[error("cannot write action store {path}: {source}")]
    ActionWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot append to metrics log {path}: {source}")]
    MetricsAppend {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read metrics log {path}: {source}")]
    MetricsRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed line {line:?} in metrics log {path}: {source}")]
    MetricsParse {
        path: PathBuf,
        line: String,
        #[source]
        source: EntryParseError,
    },

    #[error("invalid data rate: {0}")]
    InvalidRate(#[from] RateParseError),

    #[error("lookback {lookback:?} must be non-zero and shorter than the run length {total:?}")]
    InvalidSchedule { total: Duration, lookback: Duration },

    #[error("feedback timer is already armed")]
    AlreadyArmed,

    #[error("no traffic endpoint with id {0:?}")]
    UnknownEndpoint(AppId),

    #[error("iteration limit of {limit} reached for this process")]
    IterationLimit { limit: u32 },
}

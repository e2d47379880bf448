use crate::error::ControlError;
use crate::metrics::MetricsLogEntry;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub trait MetricsSink {
    fn append(&mut self, entry: &MetricsLogEntry) -> Result<(), ControlError>;
}

/// Append-only text log, one entry per line. The file is opened, written
/// with a single append and closed for every entry.
#[derive(Debug, Clone)]
pub struct FileMetricsSink {
    path: PathBuf,
}

impl FileMetricsSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for FileMetricsSink {
    fn append(&mut self, entry: &MetricsLogEntry) -> Result<(), ControlError> {
        let line = format!("{entry}\n");
        let append = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            file.write_all(line.as_bytes())?;
            file.flush()
        };
        append().map_err(|source| ControlError::MetricsAppend {
            path: self.path.clone(),
            source,
        })
    }
}

/// Controller side of the handshake: the most recent entry of the log, or
/// `None` if nothing has been logged yet.
pub fn read_latest_metrics(path: &Path) -> Result<Option<MetricsLogEntry>, ControlError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ControlError::MetricsRead {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let Some(line) = content.lines().rev().find(|l| !l.trim().is_empty()) else {
        return Ok(None);
    };
    line.parse()
        .map(Some)
        .map_err(|source| ControlError::MetricsParse {
            path: path.to_path_buf(),
            line: line.to_string(),
            source,
        })
}

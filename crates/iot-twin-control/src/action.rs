use crate::error::ControlError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A control decision: a data-rate token such as `5Mbps`. Opaque to the
/// control loop; only the traffic endpoint interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action(String);

impl Action {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ActionSource {
    fn read_action(&self) -> Result<Action, ControlError>;
}

/// Reads the first whitespace-delimited token of a text file.
#[derive(Debug, Clone)]
pub struct FileActionSource {
    path: PathBuf,
}

impl FileActionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActionSource for FileActionSource {
    fn read_action(&self) -> Result<Action, ControlError> {
        let content =
            fs::read_to_string(&self.path).map_err(|source| ControlError::ActionStoreUnreadable {
                path: self.path.clone(),
                source,
            })?;
        content
            .split_whitespace()
            .next()
            .map(Action::new)
            .ok_or_else(|| ControlError::ActionStoreEmpty {
                path: self.path.clone(),
            })
    }
}

/// Controller side of the handshake: replace the action store with a single
/// token. Must only be called once the metrics of the previous run are in.
pub fn write_action(path: &Path, rate: &str) -> Result<(), ControlError> {
    fs::write(path, rate).map_err(|source| ControlError::ActionWrite {
        path: path.to_path_buf(),
        source,
    })
}

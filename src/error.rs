//! Error taxonomy and the per-operation error channel.
//!
//! Fatal conditions (a failed mount, a failed hard link, a busy store) are
//! returned as `Err(Error)`. Best-effort sub-steps push their failures onto an
//! [`OperationReport`] instead, so one broken file never blocks the steps
//! that do not depend on it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by partition bootstrap and image lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to mount {} on {}: {reason}", .device.display(), .mount_point.display())]
    Mount {
        device: PathBuf,
        mount_point: PathBuf,
        reason: String,
    },

    #[error("failed to extract {}: {reason}{}", .archive.display(), exit_code_suffix(.code))]
    Extraction {
        archive: PathBuf,
        code: Option<i32>,
        reason: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to link {} -> {}: {source}", .from.display(), .to.display())]
    Link {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {}: {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to query filesystem statistics for {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid image name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("image '{0}' already exists")]
    AlreadyExists(String),

    #[error("not enough space on {}: need {required} bytes, {available} available", .path.display())]
    InsufficientSpace {
        path: PathBuf,
        required: u64,
        available: f64,
    },

    #[error("image store is locked by another process: {}", .lock.display())]
    Busy { lock: PathBuf },

    #[error("failed to switch keyboard layout to '{layout}': {reason}")]
    Keyboard { layout: String, reason: String },

    #[error("failed to read boot parameters from {}: {source}", .path.display())]
    BootParams {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn exit_code_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit code {code})"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }
}

/// Collects failures of best-effort steps within a single operation.
#[derive(Debug, Default)]
pub struct OperationReport {
    errors: Vec<Error>,
}

impl OperationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal failure and log it.
    pub fn push(&mut self, error: Error) {
        tracing::warn!("{error}");
        self.errors.push(error);
    }

    /// Record the error of a best-effort step, if any.
    pub fn record(&mut self, result: Result<(), Error>) {
        if let Err(error) = result {
            self.push(error);
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

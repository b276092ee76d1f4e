// src/capture/mod.rs
//
// Batch capture: turns an unframed analyzer byte stream into batch files,
// cut on an end-of-transmission marker or after the link goes quiet.

pub mod framer;
pub mod namer;
pub mod runner;
pub mod sink;

pub use framer::BatchFramer;
pub use namer::BatchNamer;
pub use runner::{run_capture, CaptureSummary};
pub use sink::{BatchRecord, BatchSink, DirectorySink};

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::io::IoError;

/// When to cut a batch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FramingPolicy {
    /// End-of-transmission marker; `None` means idle framing only
    pub marker: Option<Vec<u8>>,
    /// Silence after the last received byte that completes a batch
    pub idle_threshold: Duration,
}

/// What caused a batch to be flushed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlushTrigger {
    Marker,
    Idle,
    /// Buffered bytes written while the loop is stopping
    Shutdown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlushTrigger::Marker => write!(f, "marker"),
            FlushTrigger::Idle => write!(f, "idle"),
            FlushTrigger::Shutdown => write!(f, "shutdown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Link(#[from] IoError),

    #[error("failed to write batch {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to prepare landing directory {}: {source}", .path.display())]
    Setup {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Lifecycle stage for operator diagnostics: open, read, write or setup
    pub fn stage(&self) -> &'static str {
        match self {
            CaptureError::Link(e) => e.stage(),
            CaptureError::Write { .. } => "write",
            CaptureError::Setup { .. } => "setup",
        }
    }
}

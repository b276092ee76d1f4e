// src/capture/sink.rs
//
// Batch persistence. Each commit opens the current batch file in append
// mode, writes, syncs and closes it, then rotates to a fresh path.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::namer::BatchNamer;
use super::{CaptureError, FlushTrigger};

/// A batch that has been durably written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRecord {
    pub path: PathBuf,
    pub bytes: usize,
    pub trigger: FlushTrigger,
}

/// Destination for completed batches
pub trait BatchSink {
    /// Persist `bytes` as one complete batch. After this returns, the next
    /// commit goes to a new batch.
    fn commit(&mut self, bytes: &[u8], trigger: FlushTrigger) -> Result<BatchRecord, CaptureError>;
}

/// Writes batches as files in a landing directory.
#[derive(Debug)]
pub struct DirectorySink {
    namer: BatchNamer,
    current: PathBuf,
}

impl DirectorySink {
    /// Create the landing directory if needed and prepare the first path.
    pub fn new(dir: &Path, prefix: &str) -> Result<Self, CaptureError> {
        std::fs::create_dir_all(dir).map_err(|source| CaptureError::Setup {
            path: dir.to_path_buf(),
            source,
        })?;
        let mut namer = BatchNamer::new(dir, prefix);
        let current = namer.next_path();
        Ok(DirectorySink { namer, current })
    }

    pub fn dir(&self) -> &Path {
        self.namer.dir()
    }

    /// Path the next batch will be written to
    pub fn current_path(&self) -> &Path {
        &self.current
    }
}

impl BatchSink for DirectorySink {
    fn commit(&mut self, bytes: &[u8], trigger: FlushTrigger) -> Result<BatchRecord, CaptureError> {
        append_durably(&self.current, bytes).map_err(|source| CaptureError::Write {
            path: self.current.clone(),
            source,
        })?;

        let path = std::mem::replace(&mut self.current, self.namer.next_path());
        Ok(BatchRecord {
            path,
            bytes: bytes.len(),
            trigger,
        })
    }
}

fn append_durably(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

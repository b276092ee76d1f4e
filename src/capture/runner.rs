// src/capture/runner.rs
//
// The capture loop. Reads the link in bounded-timeout chunks, feeds the
// framer and commits completed batches to the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use super::framer::BatchFramer;
use super::sink::BatchSink;
use super::{CaptureError, FlushTrigger, FramingPolicy};
use crate::io::Link;

/// Maximum bytes taken from the link per read
pub const READ_CHUNK: usize = 1024;

/// Pause after a read that returned nothing
pub const IDLE_POLL: Duration = Duration::from_millis(50);

/// Totals reported when the loop stops
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub batches: usize,
    pub bytes: u64,
}

impl CaptureSummary {
    fn record(&mut self, bytes: usize) {
        self.batches += 1;
        self.bytes += bytes as u64;
    }
}

/// Run until `cancel` is raised or the link fails.
///
/// On cancellation any buffered bytes are committed as a final `shutdown`
/// batch. On a link failure buffered bytes are committed the same way before
/// the error is returned.
pub fn run_capture<L, S>(
    link: &mut L,
    policy: &FramingPolicy,
    sink: &mut S,
    cancel: &AtomicBool,
) -> Result<CaptureSummary, CaptureError>
where
    L: Link + ?Sized,
    S: BatchSink + ?Sized,
{
    let mut framer = BatchFramer::new(policy.marker.clone());
    let mut buf = [0u8; READ_CHUNK];
    let mut summary = CaptureSummary::default();

    tlog!(
        "[capture] Reading {} (idle {:.2}s, marker: {})",
        link.label(),
        policy.idle_threshold.as_secs_f64(),
        policy
            .marker
            .as_ref()
            .map(hex::encode)
            .unwrap_or_else(|| "disabled".to_string())
    );

    loop {
        if cancel.load(Ordering::Relaxed) {
            if let Some(rest) = framer.take() {
                commit(sink, &rest, FlushTrigger::Shutdown, &mut summary)?;
            }
            tlog!(
                "[capture] Stopped: {} batches, {} bytes",
                summary.batches,
                summary.bytes
            );
            return Ok(summary);
        }

        let n = match link.read_chunk(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                tlog!("[capture] Link failed: {}", e);
                if let Some(rest) = framer.take() {
                    if let Err(write_err) =
                        commit(sink, &rest, FlushTrigger::Shutdown, &mut summary)
                    {
                        tlog!("[capture] Could not save buffered bytes: {}", write_err);
                    }
                }
                return Err(e.into());
            }
        };
        let now = Instant::now();

        if n > 0 {
            for batch in framer.push(&buf[..n], now) {
                commit(sink, &batch, FlushTrigger::Marker, &mut summary)?;
            }
        } else {
            if let Some(batch) = framer.take_if_idle(now, policy.idle_threshold) {
                commit(sink, &batch, FlushTrigger::Idle, &mut summary)?;
            }
            std::thread::sleep(IDLE_POLL);
        }
    }
}

fn commit<S: BatchSink + ?Sized>(
    sink: &mut S,
    bytes: &[u8],
    trigger: FlushTrigger,
    summary: &mut CaptureSummary,
) -> Result<(), CaptureError> {
    let record = sink.commit(bytes, trigger)?;
    summary.record(record.bytes);
    tlog!(
        "[capture] Batch ({}): {} ({} bytes)",
        record.trigger,
        record.path.display(),
        record.bytes
    );
    Ok(())
}

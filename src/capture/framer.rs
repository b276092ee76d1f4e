// src/capture/framer.rs
//
// Accumulation buffer with end-of-transmission marker splitting and
// idle-gap detection. Pure state: no I/O, time is passed in by the caller.

use std::time::{Duration, Instant};

/// Byte accumulator that cuts batches on a marker or after a silent gap.
#[derive(Debug, Default)]
pub struct BatchFramer {
    buffer: Vec<u8>,
    marker: Option<Vec<u8>>,
    /// Most recent data arrival (the activity clock)
    last_data: Option<Instant>,
}

impl BatchFramer {
    /// An empty marker is treated as no marker.
    pub fn new(marker: Option<Vec<u8>>) -> Self {
        BatchFramer {
            buffer: Vec::new(),
            marker: marker.filter(|m| !m.is_empty()),
            last_data: None,
        }
    }

    /// Append received bytes and return every batch completed by a marker.
    ///
    /// Spans between markers are returned in stream order; empty spans
    /// (back-to-back markers) are dropped. Bytes after the last marker stay
    /// buffered. Marker bytes themselves are never part of a batch.
    pub fn push(&mut self, data: &[u8], now: Instant) -> Vec<Vec<u8>> {
        if data.is_empty() {
            return Vec::new();
        }

        let previous_len = self.buffer.len();
        self.buffer.extend_from_slice(data);
        self.last_data = Some(now);

        let Some(marker) = self.marker.as_deref() else {
            return Vec::new();
        };

        // The retained remainder never holds a complete marker, so only a
        // marker straddling the old tail and the new data needs rescanning.
        let mut search_from = previous_len.saturating_sub(marker.len() - 1);
        let mut span_start = 0;
        let mut batches = Vec::new();

        while let Some(offset) = find(&self.buffer[search_from..], marker) {
            let marker_at = search_from + offset;
            if marker_at > span_start {
                batches.push(self.buffer[span_start..marker_at].to_vec());
            }
            span_start = marker_at + marker.len();
            search_from = span_start;
        }

        if span_start > 0 {
            self.buffer.drain(..span_start);
        }
        batches
    }

    /// Take the whole buffer if it is non-empty and the link has been silent
    /// for at least `threshold` since the last data arrival.
    pub fn take_if_idle(&mut self, now: Instant, threshold: Duration) -> Option<Vec<u8>> {
        let last = self.last_data?;
        if self.buffer.is_empty() || now.saturating_duration_since(last) < threshold {
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    /// Take whatever is buffered, regardless of timing.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn last_data(&self) -> Option<Instant> {
        self.last_data
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

//! Throughput accounting for the receive loop
//!
//! [`StatsReporter`] keeps cumulative byte and line counters and decides when
//! a periodic status report is due. The check only runs after a chunk has
//! been handled, so the reporting cadence is at least the report interval and
//! at least the gap between arriving chunks. There is no timer behind it.
//!
//! Line counts are chunk-local: a newline is counted in the chunk where it
//! arrives. They drive the rate display only.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Point-in-time view of the capture counters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Raw bytes read from the transport, before decoding
    pub total_bytes: u64,
    /// Newline characters seen in decoded chunks
    pub line_count: u64,
    /// Bytes dropped by permissive decoding
    pub dropped_bytes: u64,
    /// Seconds since the receive loop started
    pub elapsed_secs: f64,
    /// Average rate since start in bytes per second
    pub rate_bps: f64,
}

impl StatsSnapshot {
    /// Average rate in KB/s (1 KB = 1024 bytes)
    pub fn rate_kbps(&self) -> f64 {
        self.rate_bps / 1024.0
    }

    /// Single-line status report, e.g.
    /// `Received: 12,345 bytes, 67 lines, Rate: 12.1 KB/s, Time: 1.0s`
    pub fn status_line(&self) -> String {
        format!(
            "Received: {} bytes, {} lines, Rate: {:.1} KB/s, Time: {:.1}s",
            group_thousands(self.total_bytes),
            group_thousands(self.line_count),
            self.rate_kbps(),
            self.elapsed_secs
        )
    }

    /// Two-line final summary printed when the loop exits
    pub fn summary_lines(&self) -> [String; 2] {
        [
            format!(
                "Final stats: {} bytes, {} lines",
                group_thousands(self.total_bytes),
                group_thousands(self.line_count)
            ),
            format!(
                "Average rate: {:.1} KB/s over {:.1} seconds",
                self.rate_kbps(),
                self.elapsed_secs
            ),
        ]
    }
}

/// Cumulative counters plus report pacing
#[derive(Debug)]
pub struct StatsReporter {
    total_bytes: u64,
    line_count: u64,
    dropped_bytes: u64,
    start_time: Instant,
    last_report_time: Instant,
    report_interval: Duration,
}

impl StatsReporter {
    /// Start accounting now
    pub fn start(report_interval: Duration) -> Self {
        Self::start_at(Instant::now(), report_interval)
    }

    /// Start accounting at a given instant
    pub fn start_at(start_time: Instant, report_interval: Duration) -> Self {
        Self {
            total_bytes: 0,
            line_count: 0,
            dropped_bytes: 0,
            start_time,
            last_report_time: start_time,
            report_interval,
        }
    }

    /// Account for one handled chunk.
    ///
    /// Returns a snapshot when a periodic report is due.
    pub fn record(&mut self, raw_len: usize, newlines: usize, dropped: usize) -> Option<StatsSnapshot> {
        self.record_at(Instant::now(), raw_len, newlines, dropped)
    }

    /// [`record`](Self::record) against an explicit clock reading
    pub fn record_at(
        &mut self,
        now: Instant,
        raw_len: usize,
        newlines: usize,
        dropped: usize,
    ) -> Option<StatsSnapshot> {
        self.total_bytes += raw_len as u64;
        self.line_count += newlines as u64;
        self.dropped_bytes += dropped as u64;

        if now.saturating_duration_since(self.last_report_time) >= self.report_interval {
            self.last_report_time = now;
            Some(self.snapshot_at(now))
        } else {
            None
        }
    }

    /// Counters computed against the elapsed time at `now`
    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let elapsed = now.saturating_duration_since(self.start_time).as_secs_f64();
        let rate_bps = if elapsed > 0.0 {
            self.total_bytes as f64 / elapsed
        } else {
            0.0
        };

        StatsSnapshot {
            total_bytes: self.total_bytes,
            line_count: self.line_count,
            dropped_bytes: self.dropped_bytes,
            elapsed_secs: elapsed,
            rate_bps,
        }
    }

    /// Final summary computed against total elapsed time
    pub fn finish(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Raw bytes accounted so far
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Lines accounted so far
    pub fn line_count(&self) -> u64 {
        self.line_count
    }
}

/// Format an integer with comma thousands separators (`1234567` -> `1,234,567`)
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

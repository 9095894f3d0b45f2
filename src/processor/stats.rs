//! Extension processor statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ProcessError;

/// Counters for one processor instance.
///
/// Atomic so concurrent packet paths update without locking.
#[derive(Debug)]
pub struct ProcessorStats {
    pub stamped: AtomicU64,
    pub verified: AtomicU64,
    pub skipped: AtomicU64,
    pub first_contact: AtomicU64,
    pub window_advanced: AtomicU64,
    pub auth_failures: AtomicU64,
    pub out_of_window: AtomicU64,
    pub duplicates: AtomicU64,
    pub malformed: AtomicU64,
    pub processing_nanos: AtomicU64,
}

impl ProcessorStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            stamped: AtomicU64::new(0),
            verified: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            first_contact: AtomicU64::new(0),
            window_advanced: AtomicU64::new(0),
            auth_failures: AtomicU64::new(0),
            out_of_window: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            processing_nanos: AtomicU64::new(0),
        }
    }

    /// Record an originated packet.
    pub fn record_stamped(&self) {
        self.stamped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet that passed every ingress check.
    pub fn record_verified(&self) {
        self.verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet forwarded without checks.
    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the first packet accepted from a neighbor.
    pub fn record_first_contact(&self) {
        self.first_contact.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet that moved a neighbor's mark forward.
    pub fn record_window_advanced(&self) {
        self.window_advanced.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped packet by error kind.
    pub fn record_drop(&self, err: &ProcessError) {
        let counter = match err {
            ProcessError::AuthenticationFailed { .. } => &self.auth_failures,
            ProcessError::SequenceOutOfWindow { .. } => &self.out_of_window,
            ProcessError::DuplicateDetected { .. } => &self.duplicates,
            ProcessError::MalformedExtension(_) => &self.malformed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Add time spent processing one packet.
    pub fn record_processing_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.processing_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> ProcessorStatsSnapshot {
        let stamped = self.stamped.load(Ordering::Relaxed);
        let verified = self.verified.load(Ordering::Relaxed);
        let skipped = self.skipped.load(Ordering::Relaxed);
        let auth_failures = self.auth_failures.load(Ordering::Relaxed);
        let out_of_window = self.out_of_window.load(Ordering::Relaxed);
        let duplicates = self.duplicates.load(Ordering::Relaxed);
        let malformed = self.malformed.load(Ordering::Relaxed);
        let processing_nanos = self.processing_nanos.load(Ordering::Relaxed);

        let packets = stamped
            + verified
            + skipped
            + auth_failures
            + out_of_window
            + duplicates
            + malformed;
        let avg_processing_micros = if packets == 0 {
            0.0
        } else {
            processing_nanos as f64 / packets as f64 / 1000.0
        };

        ProcessorStatsSnapshot {
            packets,
            stamped,
            verified,
            skipped,
            first_contact: self.first_contact.load(Ordering::Relaxed),
            window_advanced: self.window_advanced.load(Ordering::Relaxed),
            auth_failures,
            out_of_window,
            duplicates,
            malformed,
            processing_nanos,
            avg_processing_micros,
        }
    }
}

impl Default for ProcessorStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of processor stats (non-atomic, copyable).
#[derive(Clone, Debug, Default, Serialize)]
pub struct ProcessorStatsSnapshot {
    pub packets: u64,
    pub stamped: u64,
    pub verified: u64,
    pub skipped: u64,
    pub first_contact: u64,
    pub window_advanced: u64,
    pub auth_failures: u64,
    pub out_of_window: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub processing_nanos: u64,
    pub avg_processing_micros: f64,
}

impl ProcessorStatsSnapshot {
    /// Packets dropped for any reason.
    pub fn dropped(&self) -> u64 {
        self.auth_failures + self.out_of_window + self.duplicates + self.malformed
    }
}

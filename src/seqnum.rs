//! Modular sequence number arithmetic.
//!
//! Sequence numbers live on a circle `[0, range)`. A packet either moves a
//! neighbor's high-water mark forward (it is "ahead"), falls inside the
//! tolerance window behind the mark, or is rejected as stale.

use serde::{Deserialize, Serialize};

/// Default wraparound modulus: about 11.5 days of 10 ms ticks.
pub const DEFAULT_SEQ_RANGE: u32 = 100_000_000;

/// Default acceptance window in ticks behind the high-water mark.
pub const DEFAULT_WINDOW_SIZE: u32 = 10;

/// Outcome of checking a packet's sequence number against the stored mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeqCheck {
    /// Packet advances the window.
    Ahead,
    /// Packet is at or behind the mark but inside the window.
    InWindow,
    /// Packet is too far behind.
    OutOfWindow,
}

/// Sequence number space: modulus plus window tolerance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeqSpace {
    range: u32,
    window: u32,
}

impl SeqSpace {
    /// Create a sequence space.
    ///
    /// Callers validate `range >= 2` and `window < range / 2` through the
    /// configuration layer.
    pub fn new(range: u32, window: u32) -> Self {
        Self { range, window }
    }

    pub fn range(&self) -> u32 {
        self.range
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// Forward distance from `from` to `to` on the circle.
    fn distance(&self, from: u32, to: u32) -> u32 {
        let range = self.range as u64;
        ((to as u64 + range - from as u64 % range) % range) as u32
    }

    /// True if `packet` is strictly closer ahead of `stored` than behind it.
    pub fn is_ahead(&self, packet: u32, stored: u32) -> bool {
        let ahead = self.distance(stored, packet);
        ahead != 0 && (ahead as u64) * 2 < self.range as u64
    }

    /// True if `packet` is at most `window` steps behind `stored`.
    ///
    /// `packet` is treated as behind; when it is numerically larger the
    /// mark has wrapped and is lifted by one full range before comparing.
    pub fn within_window(&self, packet: u32, stored: u32) -> bool {
        let stored = if packet > stored {
            stored as u64 + self.range as u64
        } else {
            stored as u64
        };
        packet as u64 + self.window as u64 >= stored
    }

    /// Classify `packet` against `stored`.
    pub fn check(&self, packet: u32, stored: u32) -> SeqCheck {
        if self.is_ahead(packet, stored) {
            SeqCheck::Ahead
        } else if self.within_window(packet, stored) {
            SeqCheck::InWindow
        } else {
            SeqCheck::OutOfWindow
        }
    }

    /// The sequence number following `seq`, wrapping to 0 at the range.
    pub fn next(&self, seq: u32) -> u32 {
        if seq.saturating_add(1) >= self.range { 0 } else { seq + 1 }
    }

    /// Reduce an arbitrary wire value into the space.
    pub fn reduce(&self, seq: u32) -> u32 {
        seq % self.range
    }
}

impl Default for SeqSpace {
    fn default() -> Self {
        Self::new(DEFAULT_SEQ_RANGE, DEFAULT_WINDOW_SIZE)
    }
}

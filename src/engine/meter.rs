// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Output peak metering.
//!
//! The render path records per-sample peaks into a ring of 10 ms slots; a
//! monitoring thread reads them a few slots behind the writer. All storage
//! is atomic so the reader never sees torn values.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use crate::synth::SAMPLE_RATE;

const METER_SLOTS: usize = 10;
/// The reader trails the writer by this many slots.
const READ_LAG_SLOTS: usize = 6;
/// Samples per meter slot: 10 ms of output.
pub const METER_INTERVAL_SAMPLES: u32 = SAMPLE_RATE as u32 / 100;

/// Lock-free stereo peak FIFO.
pub struct PeakMeter {
    left: [AtomicI32; METER_SLOTS],
    right: [AtomicI32; METER_SLOTS],
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
}

impl PeakMeter {
    pub fn new() -> Self {
        Self {
            left: std::array::from_fn(|_| AtomicI32::new(0)),
            right: std::array::from_fn(|_| AtomicI32::new(0)),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(READ_LAG_SLOTS),
        }
    }

    /// Folds one output frame into the current slot's peaks.
    pub(super) fn record(&self, left: i16, right: i16) {
        let pos = self.write_pos.load(Ordering::Relaxed);
        self.left[pos].fetch_max(i32::from(left.unsigned_abs()), Ordering::Relaxed);
        self.right[pos].fetch_max(i32::from(right.unsigned_abs()), Ordering::Relaxed);
    }

    /// Moves the writer to the next slot. Called every
    /// [`METER_INTERVAL_SAMPLES`] samples.
    pub(super) fn advance(&self) {
        let pos = self.write_pos.load(Ordering::Relaxed);
        self.write_pos.store((pos + 1) % METER_SLOTS, Ordering::Relaxed);
    }

    /// Consumes the oldest unread slot and returns its (left, right) peaks
    /// on a 0..=100 scale.
    pub fn read(&self) -> (i32, i32) {
        let pos = self.read_pos.load(Ordering::Relaxed);
        let left = self.left[pos].swap(0, Ordering::Relaxed) / 327;
        let right = self.right[pos].swap(0, Ordering::Relaxed) / 327;
        self.read_pos.store((pos + 1) % METER_SLOTS, Ordering::Relaxed);
        (left, right)
    }

    /// Returns the meter to its start-of-stream state.
    pub(super) fn reset(&self) {
        for slot in self.left.iter().chain(self.right.iter()) {
            slot.store(0, Ordering::Relaxed);
        }
        self.write_pos.store(0, Ordering::Relaxed);
        self.read_pos.store(READ_LAG_SLOTS, Ordering::Relaxed);
    }
}

impl Default for PeakMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_surface_after_read_lag() {
        let meter = PeakMeter::new();
        // Fill the slot the reader starts on.
        for _ in 0..READ_LAG_SLOTS {
            meter.advance();
        }
        meter.record(32700, -32700);
        let (left, right) = meter.read();
        assert_eq!(left, 100);
        assert_eq!(right, 100);
        // Reading consumes the slot.
        for _ in 0..METER_SLOTS - 1 {
            meter.read();
        }
        assert_eq!(meter.read(), (0, 0));
    }

    #[test]
    fn test_record_keeps_maximum() {
        let meter = PeakMeter::new();
        for _ in 0..READ_LAG_SLOTS {
            meter.advance();
        }
        meter.record(327, 0);
        meter.record(3270, 0);
        meter.record(654, 0);
        let (left, _) = meter.read();
        assert_eq!(left, 10);
    }

    #[test]
    fn test_reset_clears_state() {
        let meter = PeakMeter::new();
        meter.record(10_000, 10_000);
        meter.advance();
        meter.reset();
        for _ in 0..METER_SLOTS {
            assert_eq!(meter.read(), (0, 0));
        }
    }
}

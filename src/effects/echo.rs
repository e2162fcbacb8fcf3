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

//! Echo: three fixed feedback-free taps with decreasing gain.

use crate::synth::SAMPLE_RATE;

/// Tap delays, in milliseconds.
const TAP_DELAYS_MS: [f64; 3] = [350.0, 700.0, 1050.0];
/// Per-tap gain at full send depth.
const TAP_GAINS: [f64; 3] = [0.5, 0.2, 0.1];

pub struct FxEcho {
    decays: [f64; 3],
    delays: [usize; 3],
    buffer_left: Vec<f64>,
    buffer_right: Vec<f64>,
    pos: usize,
    enabled: bool,
    wet_only: bool,
}

impl FxEcho {
    pub fn new(wet_only: bool) -> Self {
        Self {
            decays: [0.0; 3],
            delays: [0; 3],
            buffer_left: Vec::new(),
            buffer_right: Vec::new(),
            pos: 0,
            enabled: false,
            wet_only,
        }
    }

    /// Scales the tap gains by the send depth. Depth 0 disables the effect
    /// and frees its delay lines; the buffers are allocated lazily so an
    /// unused echo costs nothing.
    pub fn start(&mut self, depth: u8) {
        if depth == 0 {
            self.buffer_left = Vec::new();
            self.buffer_right = Vec::new();
            self.enabled = false;
            return;
        }

        if self.buffer_left.is_empty() {
            // Sized one slot past the longest tap.
            let size = (TAP_DELAYS_MS[2] * SAMPLE_RATE / 1000.0) as usize + 1;
            self.buffer_left = vec![0.0; size];
            self.buffer_right = vec![0.0; size];
            self.pos = 0;
            for (delay, ms) in self.delays.iter_mut().zip(TAP_DELAYS_MS) {
                *delay = (ms * SAMPLE_RATE / 1000.0) as usize;
            }
        }
        for (decay, gain) in self.decays.iter_mut().zip(TAP_GAINS) {
            *decay = f64::from(depth) / 127.0 * gain;
        }
        self.enabled = true;
    }

    pub fn process(&mut self, in_left: f64, in_right: f64) -> (f64, f64) {
        if !self.enabled {
            return if self.wet_only {
                (0.0, 0.0)
            } else {
                (in_left, in_right)
            };
        }

        let size = self.buffer_left.len();
        self.buffer_left[self.pos] = in_left;
        self.buffer_right[self.pos] = in_right;

        let mut out_left = 0.0;
        let mut out_right = 0.0;
        for (delay, decay) in self.delays.iter().zip(self.decays) {
            let read = (size + self.pos - delay) % size;
            out_left += self.buffer_left[read] * decay;
            out_right += self.buffer_right[read] * decay;
        }
        self.pos = (self.pos + 1) % size;

        if self.wet_only {
            (out_left, out_right)
        } else {
            (out_left + in_left, out_right + in_right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_passes_dry_through() {
        let mut echo = FxEcho::new(false);
        assert_eq!(echo.process(1.0, -1.0), (1.0, -1.0));
        echo.start(100);
        echo.start(0);
        assert_eq!(echo.process(1.0, -1.0), (1.0, -1.0));
    }

    #[test]
    fn test_impulse_repeats_at_tap_delays() {
        let mut echo = FxEcho::new(true);
        echo.start(127);

        echo.process(1.0, 1.0);
        let first = (TAP_DELAYS_MS[0] * SAMPLE_RATE / 1000.0) as usize;
        let second = (TAP_DELAYS_MS[1] * SAMPLE_RATE / 1000.0) as usize;
        let third = (TAP_DELAYS_MS[2] * SAMPLE_RATE / 1000.0) as usize;

        let mut hits = Vec::new();
        for i in 1..=third {
            let (l, r) = echo.process(0.0, 0.0);
            assert_eq!(l, r);
            if l != 0.0 {
                hits.push((i, l));
            }
        }
        assert_eq!(
            hits,
            vec![(first, 0.5), (second, 0.2), (third, 0.1)],
            "taps repeat with decreasing gain"
        );
    }

    #[test]
    fn test_no_feedback_between_taps() {
        let mut echo = FxEcho::new(true);
        echo.start(127);
        echo.process(1.0, 1.0);
        // Well past the last tap, a feedback design would keep repeating.
        let last = (TAP_DELAYS_MS[2] * SAMPLE_RATE / 1000.0) as usize;
        for _ in 0..last {
            echo.process(0.0, 0.0);
        }
        for _ in 0..last {
            assert_eq!(echo.process(0.0, 0.0), (0.0, 0.0));
        }
    }
}

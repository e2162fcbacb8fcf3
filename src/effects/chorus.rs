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

//! Chorus: five modulated delay taps panned across the stereo field.

use crate::synth::SAMPLE_RATE;

struct ChorusTap {
    /// Tap delay, in milliseconds.
    delay_ms: f64,
    /// Tap gain; set from the send depth.
    decay: f64,
    /// Stereo position, 0 = left, 127 = right.
    pan: u8,
    /// Position within the amplitude-modulation cycle, in samples.
    phase: usize,
    /// Amplitude-modulation rate, in Hz.
    modulation_frequency: f64,
    /// Fraction of the tap gain swept by the modulation.
    modulation_depth: f64,
    /// Tap delay, in samples. Derived from `delay_ms` at start.
    delay_samples: usize,
}

impl ChorusTap {
    fn new(delay_ms: f64, pan: u8, modulation_frequency: f64) -> Self {
        Self {
            delay_ms,
            decay: 0.5,
            pan,
            phase: 0,
            modulation_frequency,
            modulation_depth: 0.5,
            delay_samples: 0,
        }
    }
}

pub struct FxChorus {
    taps: [ChorusTap; 5],
    buffer_left: Vec<f64>,
    buffer_right: Vec<f64>,
    pos: usize,
    enabled: bool,
    wet_only: bool,
}

impl FxChorus {
    pub fn new(wet_only: bool) -> Self {
        Self {
            taps: [
                ChorusTap::new(35.0, 0, 10.0),
                ChorusTap::new(25.0, 32, 20.0),
                ChorusTap::new(45.0, 64, 10.0),
                ChorusTap::new(65.0, 96, 20.0),
                ChorusTap::new(50.0, 127, 10.0),
            ],
            buffer_left: Vec::new(),
            buffer_right: Vec::new(),
            pos: 0,
            enabled: false,
            wet_only,
        }
    }

    /// Maps the send depth onto every tap's gain and (re)allocates the delay
    /// line. Depth 0 disables the effect.
    pub fn start(&mut self, depth: u8) {
        let mut buffer_size = 0;
        for tap in &mut self.taps {
            tap.decay = f64::from(depth) / 127.0;
            tap.delay_samples = (tap.delay_ms * SAMPLE_RATE / 1000.0) as usize;
            // One slot past the longest delay keeps that tap a true delay.
            buffer_size = buffer_size.max(tap.delay_samples + 1);
        }
        self.buffer_left = vec![0.0; buffer_size];
        self.buffer_right = vec![0.0; buffer_size];
        self.pos = 0;
        self.enabled = depth > 0;
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
        for tap in &mut self.taps {
            let cycle = (SAMPLE_RATE / tap.modulation_frequency) as usize;
            let modulation = tap.phase as f64 / cycle as f64;
            let swing = if modulation > 0.5 {
                1.0 - modulation
            } else {
                modulation
            };
            let gain = swing * tap.modulation_depth + 1.0 - tap.modulation_depth;

            let read = (size + self.pos - tap.delay_samples) % size;
            let pan = f64::from(tap.pan);
            out_left += self.buffer_left[read] * tap.decay * (127.0 - pan) / 127.0 * gain;
            out_right += self.buffer_right[read] * tap.decay * pan / 127.0 * gain;

            tap.phase = (tap.phase + 1) % cycle;
        }
        self.pos = (self.pos + 1) % size;

        if self.wet_only {
            (out_left, out_right)
        } else {
            (out_left + in_left, out_right + in_right)
        }
    }
}

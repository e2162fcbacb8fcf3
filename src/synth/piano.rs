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

//! Additive-synthesis piano.
//!
//! A sub-octave plus ten harmonics with fixed weights and phase offsets,
//! shaped by a
//! breakpoint amplitude envelope whose playback rate scales with pitch so
//! high notes decay faster than low ones.

use std::f64::consts::TAU;

use super::voice::VoiceState;
use super::SAMPLE_RATE;

/// Partials as (frequency multiple, weight, sine coefficient, cosine
/// coefficient). The coefficient pair encodes each partial's phase offset.
const PARTIALS: [(f64, f64, f64, f64); 11] = [
    (0.5, 0.437, 0.9613, 0.2756),
    (1.0, 1.0, 1.0, 0.0),
    (2.0, 0.260, -0.8234, 0.7057),
    (3.0, 0.182, 0.4679, -0.7617),
    (4.0, 0.121, -0.9166, -0.3999),
    (5.0, 0.144, 0.7130, 0.7011),
    (6.0, 0.136, -0.022, 0.9999),
    (7.0, 0.016, 0.1865, -0.9825),
    (8.0, 0.054, 0.9973, -0.0739),
    (9.0, 0.092, 0.9800, 0.1987),
    (10.0, 0.052, 0.9553, -0.2955),
];

/// Amplitude breakpoints, in percent. Interpolated linearly; the note ends
/// when playback runs off the end of the table.
const ENVELOPE: [f64; 22] = [
    100.0, 80.0, 60.0, 40.0, 30.0, 25.0, 23.0, 21.0, 19.0, 17.0, 16.0, 13.0, 10.0, 8.0, 8.0, 6.0,
    6.0, 5.0, 4.0, 3.0, 2.0, 0.0,
];

pub(super) struct PianoGenerator {
    normalize: f64,
}

impl PianoGenerator {
    pub(super) fn new() -> Self {
        let weight_sum: f64 = PARTIALS.iter().map(|(_, weight, _, _)| weight).sum();
        Self {
            normalize: 32767.0 * 0.6 / (weight_sum * 2.0),
        }
    }

    /// Breakpoints consumed per second; higher pitches decay faster.
    fn envelope_rate(pitch: f64) -> f64 {
        (pitch / 120.0 * 40.0 + 5.0).max(5.0)
    }

    pub(super) fn render(&mut self, state: &mut VoiceState) -> Option<(f64, f64)> {
        // A released note ends immediately unless the pedal holds it.
        if state.is_releasing() && !state.sustain {
            return None;
        }

        let rate = Self::envelope_rate(state.pitch);
        let samples_per_breakpoint = SAMPLE_RATE / rate;
        let position = (state.envelope_samples / samples_per_breakpoint) as usize;
        if position + 1 >= ENVELOPE.len() {
            return None;
        }
        let inter = state.envelope_samples - position as f64 * samples_per_breakpoint;
        let envelope = ENVELOPE[position]
            + (ENVELOPE[position + 1] - ENVELOPE[position]) * inter / samples_per_breakpoint;
        state.envelope_samples += 1.0;

        let angle = TAU * state.frequency * state.phase_samples / SAMPLE_RATE;
        state.phase_samples += 1.0;
        let mut value = 0.0;
        for (multiple, weight, sine, cosine) in PARTIALS {
            let partial = angle * multiple;
            value += weight * (partial.sin() * sine + partial.cos() * cosine);
        }

        value *= self.normalize * envelope / 100.0;
        value *= f64::from(state.velocity) / 127.0;
        if state.soft {
            value *= 0.5;
        }
        Some((value, value))
    }
}

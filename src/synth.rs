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

//! The polyphonic voice engine.
//!
//! A [`Voice`] is one sounding note: shared pitch/envelope/modulation state
//! plus one of four generation strategies (additive piano, resonant square,
//! resonant triangle, sampled waveform playback).

pub mod filters;
mod osc;
mod piano;
mod sampled;
mod voice;

pub use voice::Voice;

/// Output sample rate of the whole engine, in Hz.
pub const SAMPLE_RATE: f64 = 44100.0;

/// Converts a MIDI pitch (69 = A4, fractional for bends) to a frequency.
pub fn frequency_of(pitch: f64) -> f64 {
    440.0 * 2f64.powf((pitch - 69.0) / 12.0)
}

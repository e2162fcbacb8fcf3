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

//! Procedural oscillators for the synth-lead programs.
//!
//! Both shapes share a resonance stage (band-pass mixed back over the dry
//! signal) and a low-pass cutoff, a 50-sample linear attack, and a
//! velocity-scaled release ramp. They differ in waveform, output level and
//! how fast the release ramp runs down.

use super::filters::{BandPassFilter, BandScale, LowPassFilter};
use super::voice::VoiceState;
use super::SAMPLE_RATE;

/// Width of the resonance band, in Hz.
const RESONANCE_BANDWIDTH: f64 = 200.0;
/// Length of the linear attack ramp, in samples.
const ATTACK_SAMPLES: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum OscShape {
    /// Near-square pulse from a steeply clipped triangle.
    Square,
    /// Asymmetric triangle ramp.
    Triangle,
}

pub(super) struct OscGenerator {
    shape: OscShape,
    low_pass: LowPassFilter,
    band_pass: BandPassFilter,
}

impl OscGenerator {
    pub(super) fn new(shape: OscShape) -> Self {
        Self {
            shape,
            low_pass: LowPassFilter::new(),
            band_pass: BandPassFilter::new(),
        }
    }

    pub(super) fn set_cutoff(&mut self, cutoff: f64) {
        self.low_pass.update(cutoff, SAMPLE_RATE);
    }

    pub(super) fn set_resonance(&mut self, center: f64) {
        self.band_pass
            .update(center, RESONANCE_BANDWIDTH, BandScale::Pitched, SAMPLE_RATE);
    }

    pub(super) fn render(&mut self, state: &mut VoiceState) -> Option<(f64, f64)> {
        let t = state.phase_samples / SAMPLE_RATE;
        state.phase_samples += 1.0;
        let cycles = state.frequency * t;
        let fraction = cycles - cycles.trunc();

        let mut value = match self.shape {
            OscShape::Square => {
                let folded = if fraction > 0.5 {
                    1.0 - fraction
                } else {
                    fraction
                };
                (folded * 64.0 - 16.0).clamp(-1.0, 1.0)
            }
            OscShape::Triangle => {
                let ramp = if fraction > 0.2 {
                    (1.0 - fraction) * 5.0 / 8.0
                } else {
                    fraction * 2.5
                };
                ramp * 4.0 - 1.0
            }
        };

        // The square shape runs its attack ramp into the filters; the
        // triangle applies it after them.
        if self.shape == OscShape::Square {
            value *= self.attack_gain(state);
        }

        value = self.band_pass.process(value) * 2.0 + value;
        value = self.low_pass.process(value);

        let level = match self.shape {
            OscShape::Square => 0.2,
            OscShape::Triangle => 0.5,
        };
        value *= 32767.0 * level;
        value *= f64::from(state.velocity) / 127.0;

        if self.shape == OscShape::Triangle {
            value *= self.attack_gain(state);
        }
        if state.soft {
            value *= 0.5;
        }

        let (mut left, mut right) = (value, value);
        if state.is_releasing() && !state.sustain {
            let scale = state.envelope_samples / state.release_budget;
            left *= scale;
            right *= scale;
            let (step, floor) = match self.shape {
                OscShape::Square => (5.0, 5.0),
                OscShape::Triangle => (2.0, 1.0),
            };
            state.envelope_samples -= step;
            if state.envelope_samples <= floor {
                return None;
            }
        }
        Some((left, right))
    }

    /// Linear fade-in over the first [`ATTACK_SAMPLES`] samples of a held
    /// note. Advances the envelope counter.
    fn attack_gain(&self, state: &mut VoiceState) -> f64 {
        if state.is_releasing() {
            return 1.0;
        }
        state.envelope_samples += 1.0;
        if state.envelope_samples < ATTACK_SAMPLES {
            state.envelope_samples / ATTACK_SAMPLES
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::frequency_of;

    fn held_state(pitch: u8, velocity: u8) -> VoiceState {
        VoiceState {
            pitch: f64::from(pitch),
            pitch_bend: 0.0,
            modulation_bend: 0.0,
            portamento_offset: 0.0,
            frequency: frequency_of(f64::from(pitch)),
            velocity,
            phase_samples: 0.0,
            envelope_samples: 0.0,
            release_budget: -1.0,
            sustain: false,
            sustain_spent: false,
            soft: false,
        }
    }

    #[test]
    fn test_attack_ramps_up() {
        let mut generator = OscGenerator::new(OscShape::Square);
        let mut state = held_state(69, 127);
        let mut early = 0.0f64;
        let mut late = 0.0f64;
        for i in 0..500 {
            let (l, _) = generator.render(&mut state).unwrap();
            if i < 10 {
                early = early.max(l.abs());
            } else if i > 200 {
                late = late.max(l.abs());
            }
        }
        assert!(late > early, "{late} vs {early}");
    }

    #[test]
    fn test_release_ramps_down_and_ends() {
        for shape in [OscShape::Square, OscShape::Triangle] {
            let mut generator = OscGenerator::new(shape);
            let mut state = held_state(69, 127);
            for _ in 0..1000 {
                generator.render(&mut state).unwrap();
            }
            // Neutral release velocity gives a (128 - 64) * 32 sample budget.
            let budget = (128.0 - 64.0) * 32.0;
            state.release_budget = budget;
            state.envelope_samples = budget;

            let mut rendered = 0u32;
            while generator.render(&mut state).is_some() {
                rendered += 1;
                assert!(rendered < 10_000, "release never ended");
            }
            // The ramp steps down by a fixed amount per sample.
            let step = match shape {
                OscShape::Square => 5.0,
                OscShape::Triangle => 2.0,
            };
            let expected = (budget / step) as u32;
            assert!(
                rendered >= expected - 2 && rendered <= expected + 2,
                "{shape:?}: {rendered} vs {expected}"
            );
        }
    }

    #[test]
    fn test_sustain_defers_release() {
        let mut generator = OscGenerator::new(OscShape::Triangle);
        let mut state = held_state(69, 127);
        state.sustain = true;
        state.release_budget = 2048.0;
        state.envelope_samples = 2048.0;
        for _ in 0..10_000 {
            assert!(generator.render(&mut state).is_some());
        }
        assert_eq!(state.envelope_samples, 2048.0);
    }

    #[test]
    fn test_waveform_is_periodic_and_bounded() {
        for shape in [OscShape::Square, OscShape::Triangle] {
            let mut generator = OscGenerator::new(shape);
            let mut state = held_state(69, 127);
            state.frequency = 441.0;
            let mut outputs = Vec::new();
            for _ in 0..1000 {
                let (l, r) = generator.render(&mut state).unwrap();
                assert_eq!(l, r);
                // Dry plus doubled resonance path through unity filters can
                // triple the raw waveform at most.
                assert!(l.abs() <= 32767.0 * 3.0, "{shape:?}: {l}");
                outputs.push(l);
            }
            // 441 Hz at 44,100 Hz repeats every 100 samples; compare two
            // periods past the attack ramp.
            for i in 500..600 {
                assert!(
                    (outputs[i] - outputs[i + 100]).abs() < 1e-6,
                    "{shape:?} not periodic at {i}"
                );
            }
        }
    }
}

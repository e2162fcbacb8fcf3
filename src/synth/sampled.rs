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

//! Sample playback at a pitch-derived rate.
//!
//! The recording is resampled by stepping through it at the ratio of the
//! note's frequency to the recording's base frequency, with linear
//! interpolation between frames. Looped samples wrap fractional positions
//! inside their loop window; unlooped ones end at the last frame.

use std::sync::Arc;

use crate::samples::WaveformSample;

use super::voice::VoiceState;

pub(super) struct SampledGenerator {
    sample: Arc<WaveformSample>,
    /// Playback step per output sample.
    frequency_ratio: f64,
    /// Set once the release ramp has run out.
    finished: bool,
}

impl SampledGenerator {
    pub(super) fn new(sample: Arc<WaveformSample>, frequency: f64) -> Self {
        let frequency_ratio = frequency / sample.base_frequency;
        let finished = sample.is_empty();
        Self {
            sample,
            frequency_ratio,
            finished,
        }
    }

    pub(super) fn always_sustain(&self) -> bool {
        self.sample.always_sustain
    }

    /// Re-derives the playback step after a frequency change.
    pub(super) fn set_frequency(&mut self, frequency: f64) {
        self.frequency_ratio = frequency / self.sample.base_frequency;
    }

    pub(super) fn render(&mut self, state: &mut VoiceState) -> Option<(f64, f64)> {
        if self.finished {
            return None;
        }

        let mut pos = self.frequency_ratio * state.phase_samples;
        if self.sample.looped && pos >= self.sample.loop_end {
            let window = self.sample.loop_end - self.sample.loop_start;
            let wraps = (pos - self.sample.loop_end) / window;
            pos = self.sample.loop_start + window * wraps.fract();
        }

        let index = pos as usize;
        if index + 1 >= self.sample.len() {
            return None;
        }
        let fraction = pos - index as f64;
        let mut left = f64::from(self.sample.left[index]) * (1.0 - fraction)
            + f64::from(self.sample.left[index + 1]) * fraction;
        let mut right = f64::from(self.sample.right[index]) * (1.0 - fraction)
            + f64::from(self.sample.right[index + 1]) * fraction;
        state.phase_samples += 1.0;

        if state.soft {
            left *= 0.5;
            right *= 0.5;
        }
        let gain = 0.6 * f64::from(state.velocity) / 127.0;
        left *= gain;
        right *= gain;

        if state.is_releasing() && !state.sustain {
            let scale = state.envelope_samples / state.release_budget;
            left *= scale;
            right *= scale;
            state.envelope_samples -= 1.0;
            if state.envelope_samples <= 0.0 {
                self.finished = true;
            }
        }
        Some((left, right))
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

    fn ramp_sample(frames: usize, looped: bool) -> Arc<WaveformSample> {
        let left: Vec<i16> = (0..frames).map(|i| i as i16).collect();
        let right: Vec<i16> = left.iter().map(|v| -v).collect();
        Arc::new(WaveformSample {
            bank: 0,
            instrument: 0,
            pitch: 69.0,
            pitch_from: 0.0,
            pitch_to: 127.0,
            base_frequency: frequency_of(69.0),
            looped,
            always_sustain: false,
            loop_start: 10.0,
            loop_end: 90.0,
            left,
            right,
        })
    }

    #[test]
    fn test_unity_ratio_steps_one_frame_per_sample() {
        let sample = ramp_sample(100, false);
        let mut generator = SampledGenerator::new(sample, frequency_of(69.0));
        let mut state = held_state(69, 127);
        let (l, r) = generator.render(&mut state).unwrap();
        assert_eq!(l, 0.0);
        assert_eq!(r, 0.0);
        let (l, _) = generator.render(&mut state).unwrap();
        // Frame 1, scaled by the 0.6 output gain.
        assert!((l - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_octave_up_doubles_step_and_interpolates() {
        let sample = ramp_sample(100, false);
        let mut generator = SampledGenerator::new(sample, frequency_of(81.0));
        let mut state = held_state(81, 127);
        generator.render(&mut state).unwrap();
        let (l, _) = generator.render(&mut state).unwrap();
        // One octave up steps two frames per output sample.
        assert!((l - 2.0 * 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_unlooped_sample_ends_at_last_frame() {
        let sample = ramp_sample(50, false);
        let mut generator = SampledGenerator::new(sample, frequency_of(69.0));
        let mut state = held_state(69, 127);
        let mut rendered = 0;
        while generator.render(&mut state).is_some() {
            rendered += 1;
            assert!(rendered < 100);
        }
        assert_eq!(rendered, 49);
    }

    #[test]
    fn test_looped_sample_wraps_inside_window() {
        let sample = ramp_sample(100, true);
        let mut generator = SampledGenerator::new(sample, frequency_of(69.0));
        let mut state = held_state(69, 127);
        for _ in 0..1000 {
            let (l, _) = generator.render(&mut state).expect("looped playback");
            // Values stay inside the loop window once wrapped: the window
            // is frames 10..90 and the ramp value equals the frame index.
            assert!(l <= 90.0 * 0.6 + 1e-9);
        }
    }

    #[test]
    fn test_release_fades_and_finishes() {
        let sample = ramp_sample(100, true);
        let mut generator = SampledGenerator::new(sample, frequency_of(69.0));
        let mut state = held_state(69, 127);
        state.release_budget = 64.0;
        state.envelope_samples = 64.0;
        let mut rendered = 0;
        while generator.render(&mut state).is_some() {
            rendered += 1;
            assert!(rendered < 1000);
        }
        assert_eq!(rendered, 64);
        // Finished generators stay finished.
        assert!(generator.render(&mut state).is_none());
    }
}

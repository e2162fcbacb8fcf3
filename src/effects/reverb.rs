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

//! Reverb in the freeverb topology: per side, a pre-delay line feeds eight
//! parallel damped comb filters whose sum runs through four serial allpass
//! sections. The right side's delay lengths are offset from the left's by
//! the stereo depth, which is what decorrelates the two channels.

use crate::synth::SAMPLE_RATE;

/// Comb delay lengths in samples at 44,100 Hz.
const COMB_LENGTHS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
/// Allpass delay lengths in samples at 44,100 Hz.
const ALLPASS_LENGTHS: [usize; 4] = [225, 341, 441, 556];
/// Length spread between the stereo sides, in samples.
const STEREO_ADJUST: f64 = 12.0;

fn db_to_linear(db: f64) -> f64 {
    (db * std::f64::consts::LN_10 * 0.05).exp()
}

/// Feedback comb with a one-pole damping filter in the loop.
struct CombFilter {
    buffer: Vec<f64>,
    pos: usize,
    store: f64,
}

impl CombFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            pos: 0,
            store: 0.0,
        }
    }

    fn process(&mut self, input: f64, feedback: f64, damping: f64) -> f64 {
        let output = self.buffer[self.pos];
        self.store = output + (self.store - output) * damping;
        self.buffer[self.pos] = input + self.store * feedback;
        self.pos = if self.pos == 0 {
            self.buffer.len() - 1
        } else {
            self.pos - 1
        };
        output
    }
}

struct AllpassFilter {
    buffer: Vec<f64>,
    pos: usize,
}

impl AllpassFilter {
    fn new(size: usize) -> Self {
        Self {
            buffer: vec![0.0; size.max(1)],
            pos: 0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let output = self.buffer[self.pos];
        self.buffer[self.pos] = input + output * 0.5;
        self.pos = if self.pos == 0 {
            self.buffer.len() - 1
        } else {
            self.pos - 1
        };
        output - input
    }
}

/// The comb/allpass bank for one output channel.
struct FilterBank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl FilterBank {
    /// `offset` shifts the delay lengths, alternating sign per filter, to
    /// decorrelate the two stereo banks.
    fn new(sample_rate: f64, scale: f64, offset: f64) -> Self {
        let r = sample_rate / 44100.0;
        let mut sign = 1.0;
        let combs = COMB_LENGTHS
            .iter()
            .map(|&length| {
                let size = (scale * r * (length as f64 + STEREO_ADJUST * offset * sign) + 0.5)
                    as usize;
                sign = -sign;
                CombFilter::new(size)
            })
            .collect();
        let allpasses = ALLPASS_LENGTHS
            .iter()
            .map(|&length| {
                let size = (r * (length as f64 + STEREO_ADJUST * offset * sign) + 0.5) as usize;
                sign = -sign;
                AllpassFilter::new(size)
            })
            .collect();
        Self { combs, allpasses }
    }

    fn process(&mut self, input: f64, feedback: f64, damping: f64, gain: f64) -> f64 {
        let mut output = 0.0;
        for comb in &mut self.combs {
            output += comb.process(input, feedback, damping);
        }
        for allpass in &mut self.allpasses {
            output = allpass.process(output);
        }
        output * gain
    }
}

/// A simple ring delay for the pre-delay stage.
struct DelayLine {
    buffer: Vec<f64>,
    pos: usize,
}

impl DelayLine {
    fn new(samples: usize) -> Self {
        Self {
            buffer: vec![0.0; samples.max(1)],
            pos: 0,
        }
    }

    fn process(&mut self, input: f64) -> f64 {
        let output = self.buffer[self.pos];
        self.buffer[self.pos] = input;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }
}

struct ReverbUnit {
    feedback: f64,
    damping: f64,
    gain: f64,
    pre_delay_left: DelayLine,
    pre_delay_right: DelayLine,
    left: FilterBank,
    right: FilterBank,
}

impl ReverbUnit {
    fn new(
        sample_rate: f64,
        wet_gain_db: f64,
        room_scale: f64,
        reverberance: f64,
        hf_damping: f64,
        pre_delay_ms: f64,
        stereo_depth: f64,
    ) -> Self {
        let pre_delay = (pre_delay_ms / 1000.0 * sample_rate + 0.5) as usize;
        let scale = room_scale / 100.0 * 0.9;
        let depth = stereo_depth / 100.0;
        // Map reverberance so 0% decays within ~0.3 s and 98% within the
        // practical maximum.
        let a = -1.0 / (1.0 - 0.3f64).ln();
        let b = 100.0 / ((1.0 - 0.98f64).ln() * a + 1.0);
        Self {
            feedback: 1.0 - ((reverberance - b) / (a * b)).exp(),
            damping: hf_damping / 100.0 * 0.3 + 0.2,
            gain: db_to_linear(wet_gain_db) * 0.015,
            pre_delay_left: DelayLine::new(pre_delay),
            pre_delay_right: DelayLine::new(pre_delay),
            left: FilterBank::new(sample_rate, scale, 0.0),
            right: FilterBank::new(sample_rate, scale, depth),
        }
    }

    fn process(&mut self, in_left: f64, in_right: f64) -> (f64, f64) {
        let delayed_left = self.pre_delay_left.process(in_left);
        let delayed_right = self.pre_delay_right.process(in_right);
        (
            self.left
                .process(delayed_left, self.feedback, self.damping, self.gain),
            self.right
                .process(delayed_right, self.feedback, self.damping, self.gain),
        )
    }
}

pub struct FxReverb {
    hf_damping: f64,
    pre_delay_ms: f64,
    stereo_depth: f64,
    wet_gain_db: f64,
    room_scale: f64,
    wet_only: bool,
    unit: Option<ReverbUnit>,
}

impl FxReverb {
    pub fn new(wet_only: bool) -> Self {
        Self {
            hf_damping: 50.0,
            pre_delay_ms: 5.0,
            stereo_depth: 100.0,
            wet_gain_db: 0.0,
            room_scale: 100.0,
            wet_only,
            unit: None,
        }
    }

    /// Configures and enables the reverb. Parameters are fixed while the
    /// effect runs: calling start again while enabled changes nothing, and
    /// depth 0 disables it.
    pub fn start(&mut self, depth: u8) {
        if depth == 0 {
            self.unit = None;
            return;
        }
        if self.unit.is_some() {
            return;
        }
        let reverberance = f64::from(depth) / 127.0 * 50.0 + 20.0;
        self.unit = Some(ReverbUnit::new(
            SAMPLE_RATE,
            self.wet_gain_db,
            self.room_scale,
            reverberance,
            self.hf_damping,
            self.pre_delay_ms,
            self.stereo_depth,
        ));
    }

    pub fn process(&mut self, in_left: f64, in_right: f64) -> (f64, f64) {
        let Some(unit) = &mut self.unit else {
            return if self.wet_only {
                (0.0, 0.0)
            } else {
                (in_left, in_right)
            };
        };
        let (wet_left, wet_right) = unit.process(in_left, in_right);
        if self.wet_only {
            (wet_left, wet_right)
        } else {
            (in_left + wet_left, in_right + wet_right)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_is_identity() {
        let mut reverb = FxReverb::new(false);
        assert_eq!(reverb.process(0.5, -0.25), (0.5, -0.25));
        reverb.start(100);
        reverb.start(0);
        assert_eq!(reverb.process(0.5, -0.25), (0.5, -0.25));
    }

    #[test]
    fn test_impulse_produces_decaying_tail() {
        let mut reverb = FxReverb::new(true);
        reverb.start(100);

        reverb.process(10_000.0, 10_000.0);
        let mut early_energy = 0.0;
        let mut late_energy = 0.0;
        for i in 0..441_000 {
            let (l, r) = reverb.process(0.0, 0.0);
            assert!(l.is_finite() && r.is_finite());
            let energy = l * l + r * r;
            if i < 44_100 {
                early_energy += energy;
            } else if i > 396_900 {
                late_energy += energy;
            }
        }
        assert!(early_energy > 0.0, "no reverb tail at all");
        assert!(
            late_energy < early_energy / 100.0,
            "tail does not decay: {early_energy} vs {late_energy}"
        );
    }

    #[test]
    fn test_tail_starts_after_pre_delay() {
        let mut reverb = FxReverb::new(true);
        reverb.start(64);
        reverb.process(1.0, 1.0);
        // 5 ms pre-delay plus the shortest comb delay keeps the first
        // reflection well past 220 samples.
        for _ in 0..220 {
            let (l, r) = reverb.process(0.0, 0.0);
            assert_eq!((l, r), (0.0, 0.0));
        }
    }

    #[test]
    fn test_stereo_sides_decorrelate() {
        let mut reverb = FxReverb::new(true);
        reverb.start(100);
        reverb.process(1.0, 1.0);
        let mut diverged = false;
        for _ in 0..44_100 {
            let (l, r) = reverb.process(0.0, 0.0);
            if (l - r).abs() > 1e-12 && (l != 0.0 || r != 0.0) {
                diverged = true;
            }
        }
        assert!(diverged, "identical left/right tails");
    }

    #[test]
    fn test_params_fixed_while_enabled() {
        let mut reverb = FxReverb::new(true);
        reverb.start(127);
        // Prime some state, then try to reconfigure.
        for _ in 0..1000 {
            reverb.process(1.0, 1.0);
        }
        reverb.start(1);
        // Still enabled with the old feedback: the tail keeps ringing.
        let (l, _) = reverb.process(0.0, 0.0);
        let mut any = l != 0.0;
        for _ in 0..5000 {
            let (l, _) = reverb.process(0.0, 0.0);
            any |= l != 0.0;
        }
        assert!(any);
    }
}

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

//! Recursive filters used by the voice generators and effects.
//!
//! All three filters are small IIR sections with coefficients recomputed
//! only when their parameters change, so the per-sample path is a handful
//! of multiplies. Coefficients are clamped into the stable region, keeping
//! output bounded for any valid (frequency, sample rate) pair.

use std::f64::consts::{PI, TAU};

/// Single-pole low-pass section.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    coefficient: f64,
    previous: f64,
}

impl LowPassFilter {
    /// A filter that initially passes its input through unchanged.
    pub fn new() -> Self {
        Self {
            coefficient: 1.0,
            previous: 0.0,
        }
    }

    /// Recomputes the coefficient for a cutoff frequency. A cutoff of zero
    /// disables the filter rather than silencing the signal.
    pub fn update(&mut self, cutoff: f64, sample_rate: f64) {
        let rc = if cutoff == 0.0 {
            0.0
        } else {
            0.5 / (PI * cutoff)
        };
        self.coefficient = 1.0 / (1.0 + rc * sample_rate);
        self.previous = 0.0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.previous += self.coefficient * (input - self.previous);
        self.previous
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-pole high-pass section.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct HighPassFilter {
    coefficient: f64,
    previous_input: f64,
    previous_output: f64,
}

#[allow(dead_code)]
impl HighPassFilter {
    pub fn new() -> Self {
        Self {
            coefficient: 1.0,
            previous_input: 0.0,
            previous_output: 0.0,
        }
    }

    /// Recomputes the coefficient for a cutoff frequency. A cutoff of zero
    /// blocks the signal entirely.
    pub fn update(&mut self, cutoff: f64, sample_rate: f64) {
        let rc = if cutoff == 0.0 {
            0.0
        } else {
            0.5 / (PI * cutoff)
        };
        self.coefficient = rc / (rc + 1.0 / sample_rate);
        self.previous_input = 0.0;
        self.previous_output = 0.0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.coefficient * (input - self.previous_input + self.previous_output);
        self.previous_input = input;
        self.previous_output = output;
        output
    }
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// How a band-pass section normalizes its peak gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandScale {
    /// Unity gain at the center frequency, for pitched material.
    Pitched,
    /// Unity total noise gain across the band.
    #[allow(dead_code)]
    Noise,
}

/// Two-pole resonant band-pass section.
#[derive(Debug, Clone)]
pub struct BandPassFilter {
    a: f64,
    b: f64,
    c: f64,
    y1: f64,
    y2: f64,
}

impl BandPassFilter {
    /// A section that initially passes its input through unchanged; call
    /// [`Self::update`] to give it a band.
    pub fn new() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Recomputes the coefficients for a center frequency and bandwidth,
    /// both in Hz. Pole radius is kept strictly below one.
    pub fn update(&mut self, center: f64, bandwidth: f64, scale: BandScale, sample_rate: f64) {
        let c = (-TAU * bandwidth / sample_rate).exp().min(0.999_999);
        let b = -4.0 * c / (1.0 + c) * (TAU * center / sample_rate).cos();
        let a = match scale {
            BandScale::Pitched => (1.0 - b * b / (4.0 * c)).max(0.0).sqrt() * (1.0 - c),
            BandScale::Noise => {
                let num = ((1.0 + c) * (1.0 + c) - b * b) * (1.0 - c) / (1.0 + c);
                num.max(0.0).sqrt()
            }
        };
        self.a = a;
        self.b = b;
        self.c = c;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.a * input - self.b * self.y1 - self.c * self.y2;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

impl Default for BandPassFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bounded pseudo-random test signal in [-1, 1].
    fn noise(len: usize) -> Vec<f64> {
        let mut state = 0x2545f491u32;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                f64::from(state >> 8) / f64::from(1u32 << 23) - 1.0
            })
            .collect()
    }

    #[test]
    fn test_low_pass_attenuates_and_stays_bounded() {
        for cutoff in [0.0, 20.0, 440.0, 8000.0] {
            let mut filter = LowPassFilter::new();
            filter.update(cutoff, 44100.0);
            for sample in noise(10_000) {
                let out = filter.process(sample);
                assert!(out.abs() <= 1.0, "cutoff {cutoff}: output {out}");
            }
        }
    }

    #[test]
    fn test_low_pass_zero_cutoff_passes_through() {
        let mut filter = LowPassFilter::new();
        filter.update(0.0, 44100.0);
        assert!((filter.process(0.75) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_high_pass_blocks_dc() {
        let mut filter = HighPassFilter::new();
        filter.update(440.0, 44100.0);
        let mut last = 1.0;
        for _ in 0..10_000 {
            last = filter.process(1.0);
        }
        assert!(last.abs() < 1e-6);
    }

    #[test]
    fn test_high_pass_stays_bounded() {
        for cutoff in [0.0, 20.0, 1000.0, 15000.0] {
            let mut filter = HighPassFilter::new();
            filter.update(cutoff, 44100.0);
            for sample in noise(10_000) {
                let out = filter.process(sample);
                assert!(out.abs() < 1000.0, "cutoff {cutoff}: output {out}");
            }
        }
    }

    #[test]
    fn test_band_pass_stays_bounded() {
        for (center, bandwidth) in [(440.0, 20.0), (1000.0, 100.0), (100.0, 1.0), (8000.0, 0.0)] {
            for scale in [BandScale::Pitched, BandScale::Noise] {
                let mut filter = BandPassFilter::new();
                filter.update(center, bandwidth, scale, 44100.0);
                let mut peak = 0.0f64;
                for sample in noise(20_000) {
                    let out = filter.process(sample);
                    assert!(out.is_finite());
                    peak = peak.max(out.abs());
                }
                assert!(
                    peak < 10_000.0,
                    "center {center} bandwidth {bandwidth}: peak {peak}"
                );
            }
        }
    }

    #[test]
    fn test_band_pass_selects_center_frequency() {
        // A sine at the center frequency passes with near-unity gain, a
        // far-away sine is strongly attenuated.
        let sample_rate = 44100.0;
        let mut filter = BandPassFilter::new();
        filter.update(441.0, 50.0, BandScale::Pitched, sample_rate);

        let gain_at = |filter: &mut BandPassFilter, frequency: f64| {
            let mut peak = 0.0f64;
            for i in 0..44_100 {
                let t = f64::from(i) / sample_rate;
                let out = filter.process(f64::sin(TAU * frequency * t));
                // Let the transient settle before measuring.
                if i > 10_000 {
                    peak = peak.max(out.abs());
                }
            }
            peak
        };

        let on_center = gain_at(&mut filter, 441.0);
        filter.update(441.0, 50.0, BandScale::Pitched, sample_rate);
        let off_center = gain_at(&mut filter, 4410.0);
        assert!(on_center > 0.7, "on-center gain {on_center}");
        assert!(off_center < 0.2, "off-center gain {off_center}");
    }
}

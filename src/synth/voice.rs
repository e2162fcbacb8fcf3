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

//! A single sounding note.

use crate::samples::{SampleLibrary, PERCUSSION_BANK_OFFSET};

use super::osc::{OscGenerator, OscShape};
use super::piano::PianoGenerator;
use super::sampled::SampledGenerator;
use super::{frequency_of, SAMPLE_RATE};

/// Fastest vibrato rate, in Hz.
const MAX_MODULATION_FREQUENCY: f64 = 10.0;
/// Deepest vibrato excursion, in semitones.
const MAX_MODULATION_PITCH: f64 = 1.0;
/// Base portamento glide speed, in semitones.
const PORTAMENTO_SPEED: f64 = 5.0;

/// Programs that select the procedural oscillators instead of samples.
const PROGRAM_SQUARE_LEAD: u8 = 80;
const PROGRAM_TRIANGLE_LEAD: u8 = 81;

/// Shared per-note state every generation strategy reads and advances.
pub(super) struct VoiceState {
    /// The note's pitch, in semitones.
    pub pitch: f64,
    /// Pitch bend offset, in semitones.
    pub pitch_bend: f64,
    /// Vibrato offset, in semitones.
    pub modulation_bend: f64,
    /// Remaining portamento offset, in semitones. Decays toward zero.
    pub portamento_offset: f64,
    /// Current frequency after all offsets.
    pub frequency: f64,
    /// Note On velocity.
    pub velocity: u8,
    /// Fractional sample position within the waveform. Rescaled on every
    /// frequency change so the phase stays continuous.
    pub phase_samples: f64,
    /// Envelope position; doubles as the remaining release counter once the
    /// note has been released.
    pub envelope_samples: f64,
    /// Total release length in samples, or negative while the note is held.
    pub release_budget: f64,
    /// Whether the sustain pedal currently holds this note.
    pub sustain: bool,
    /// Set once the pedal has let this note go. The latch is one-way: a
    /// later pedal press cannot re-hold the note.
    pub sustain_spent: bool,
    /// Whether the note is softened by the soft pedal.
    pub soft: bool,
}

impl VoiceState {
    fn new(pitch: u8, velocity: u8) -> Self {
        let pitch = f64::from(pitch);
        Self {
            pitch,
            pitch_bend: 0.0,
            modulation_bend: 0.0,
            portamento_offset: 0.0,
            frequency: frequency_of(pitch),
            velocity,
            phase_samples: 0.0,
            envelope_samples: 0.0,
            release_budget: -1.0,
            sustain: false,
            sustain_spent: false,
            soft: false,
        }
    }

    /// True once Note Off (or its running-status equivalent) has arrived.
    pub fn is_releasing(&self) -> bool {
        self.release_budget >= 0.0
    }
}

enum Generator {
    Piano(PianoGenerator),
    Square(OscGenerator),
    Triangle(OscGenerator),
    Sampled(SampledGenerator),
}

/// One sounding note: shared state plus a generation strategy chosen from
/// the instrument assignment at Note On.
pub struct Voice {
    state: VoiceState,
    generator: Generator,
    modulation_step: f64,
    modulation_bound: f64,
    modulation_direction: f64,
    portamento_step: f64,
    portamento_active: bool,
}

impl Voice {
    /// Picks a generation strategy for a note and builds the voice.
    ///
    /// Percussion banks always use sample playback and drop the note when no
    /// sample covers the pitch. Melodic programs prefer samples, fall back to
    /// the procedural oscillators for the synth-lead programs, and fall back
    /// to the additive piano for program 0 so a missing store still produces
    /// sound.
    pub fn allocate(
        bank: u16,
        instrument: u8,
        pitch: u8,
        velocity: u8,
        library: &SampleLibrary,
    ) -> Option<Self> {
        let state = VoiceState::new(pitch, velocity);

        let generator = if bank >= PERCUSSION_BANK_OFFSET {
            let sample = library.lookup(bank, 0, state.pitch)?;
            Generator::Sampled(SampledGenerator::new(sample, state.frequency))
        } else if instrument == PROGRAM_SQUARE_LEAD {
            Generator::Square(OscGenerator::new(OscShape::Square))
        } else if instrument == PROGRAM_TRIANGLE_LEAD {
            Generator::Triangle(OscGenerator::new(OscShape::Triangle))
        } else {
            match library.lookup(bank, instrument, state.pitch) {
                Some(sample) => Generator::Sampled(SampledGenerator::new(sample, state.frequency)),
                // The additive piano keeps program 0 audible without a store.
                None if instrument == 0 => Generator::Piano(PianoGenerator::new()),
                None => return None,
            }
        };

        Some(Self {
            state,
            generator,
            modulation_step: 0.0,
            modulation_bound: 0.0,
            modulation_direction: 1.0,
            portamento_step: 0.0,
            portamento_active: false,
        })
    }

    /// The note's pitch, for matching Note Off against live voices.
    pub fn pitch(&self) -> f64 {
        self.state.pitch
    }

    pub fn is_releasing(&self) -> bool {
        self.state.is_releasing()
    }

    /// Starts the release phase. Low release velocities give a long tail,
    /// high ones cut the note quickly. Samples flagged always-sustain ignore
    /// the release entirely.
    pub fn release(&mut self, velocity: u8) {
        if let Generator::Sampled(generator) = &self.generator {
            if generator.always_sustain() {
                return;
            }
        }
        if self.state.is_releasing() {
            return;
        }
        let budget = f64::from(128 - u16::from(velocity.min(127))) * 32.0;
        self.state.release_budget = budget;
        self.state.envelope_samples = budget;
    }

    /// Applies a 14-bit pitch bend value over the channel's bend range.
    pub fn pitch_bend(&mut self, value: u16, range: u8) {
        let normalized = (f64::from(value) - 8192.0) / 8192.0;
        self.state.pitch_bend = normalized * f64::from(range);
        self.recalibrate();
    }

    /// Latches the sustain pedal. The latch is one-way: once the pedal has
    /// let the note go, a later pedal press leaves it released.
    pub fn set_sustain(&mut self, sustain: bool) {
        if self.state.sustain_spent {
            return;
        }
        if sustain {
            self.state.sustain = true;
        } else if self.state.sustain {
            self.state.sustain = false;
            self.state.sustain_spent = true;
        }
    }

    pub fn set_soft(&mut self, soft: bool) {
        self.state.soft = soft;
    }

    /// Updates the vibrato LFO. Depth sets the pitch excursion, speed sets
    /// the rate (0 fastest, 127 slowest).
    pub fn set_modulation(&mut self, depth: u8, speed: u8) {
        if depth == 0 {
            if self.state.modulation_bend != 0.0 {
                self.state.modulation_bend = 0.0;
                self.recalibrate();
            }
            self.modulation_step = 0.0;
            self.modulation_bound = 0.0;
            return;
        }
        let rate =
            f64::from(u16::from(depth) + 1) / 128.0 * 4.0 * f64::from(128 - u16::from(speed)) / 128.0;
        self.modulation_step = rate * MAX_MODULATION_FREQUENCY / SAMPLE_RATE;
        self.modulation_bound = f64::from(depth) * MAX_MODULATION_PITCH / 128.0;
    }

    /// Starts a glide from a previous pitch toward this voice's own pitch.
    /// Time 0 is the fastest glide, 127 the slowest.
    pub fn set_portamento_from(&mut self, from_pitch: f64, time: u8) {
        self.state.portamento_offset = from_pitch - self.state.pitch;
        if self.state.portamento_offset == 0.0 {
            return;
        }
        let duration = SAMPLE_RATE * 0.2 * f64::from(time) / 127.0 + 1.0;
        self.portamento_step = PORTAMENTO_SPEED / duration;
        self.portamento_active = true;
        self.recalibrate();
    }

    /// Sets the oscillator low-pass cutoff, in Hz. Sample and piano voices
    /// have no filter stage and ignore this.
    pub fn set_cutoff_frequency(&mut self, cutoff: f64) {
        match &mut self.generator {
            Generator::Square(g) | Generator::Triangle(g) => g.set_cutoff(cutoff),
            _ => {}
        }
    }

    /// Sets the oscillator resonance center frequency, in Hz.
    pub fn set_resonance_frequency(&mut self, center: f64) {
        match &mut self.generator {
            Generator::Square(g) | Generator::Triangle(g) => g.set_resonance(center),
            _ => {}
        }
    }

    /// Renders the next output frame. `None` means the note has finished
    /// and the voice should be dropped.
    pub fn render(&mut self) -> Option<(f64, f64)> {
        if self.portamento_active {
            self.advance_portamento();
        }
        if self.modulation_step != 0.0 {
            self.advance_modulation();
        }
        match &mut self.generator {
            Generator::Piano(g) => g.render(&mut self.state),
            Generator::Square(g) | Generator::Triangle(g) => g.render(&mut self.state),
            Generator::Sampled(g) => g.render(&mut self.state),
        }
    }

    /// Recomputes the frequency from pitch plus all offsets, rescaling the
    /// phase position so the waveform continues without a discontinuity.
    fn recalibrate(&mut self) {
        let previous = self.state.frequency;
        self.state.frequency = frequency_of(
            self.state.pitch
                + self.state.pitch_bend
                + self.state.modulation_bend
                + self.state.portamento_offset,
        );
        if previous > 0.0 && self.state.frequency > 0.0 {
            self.state.phase_samples *= previous / self.state.frequency;
        }
        if let Generator::Sampled(g) = &mut self.generator {
            g.set_frequency(self.state.frequency);
        }
    }

    fn advance_portamento(&mut self) {
        if self.state.portamento_offset > 0.0 {
            self.state.portamento_offset =
                (self.state.portamento_offset - self.portamento_step).max(0.0);
        } else {
            self.state.portamento_offset =
                (self.state.portamento_offset + self.portamento_step).min(0.0);
        }
        if self.state.portamento_offset == 0.0 {
            self.portamento_active = false;
        }
        self.recalibrate();
    }

    /// One triangle-LFO step: sweep the bend between the depth bounds,
    /// flipping direction at each edge.
    fn advance_modulation(&mut self) {
        self.state.modulation_bend += self.modulation_step * self.modulation_direction;
        if self.state.modulation_bend > self.modulation_bound {
            self.modulation_direction = -1.0;
        } else if self.state.modulation_bend < -self.modulation_bound {
            self.modulation_direction = 1.0;
        }
        self.recalibrate();
    }
}

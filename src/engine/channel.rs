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

//! Per-channel controller state and voice pool.

use tracing::debug;

use crate::effects::{FxChorus, FxEcho, FxReverb};
use crate::midi::{controller, EventKind, MidiEvent};
use crate::samples::{SampleLibrary, PERCUSSION_BANK_OFFSET};
use crate::synth::Voice;

/// Most voices a single channel can sound at once. Note Ons past the cap
/// are dropped.
pub const MAX_POLYPHONICS: usize = 64;

/// Which parameter-address pair the next Data Entry writes against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParameterSelect {
    None,
    Registered,
    NonRegistered,
}

/// Effect instances owned by one channel under the per-channel topology.
struct ChannelEffects {
    chorus: FxChorus,
    echo: FxEcho,
    reverb: FxReverb,
}

impl ChannelEffects {
    fn new() -> Self {
        Self {
            chorus: FxChorus::new(false),
            echo: FxEcho::new(false),
            reverb: FxReverb::new(false),
        }
    }
}

/// Controller state machine and voice pool for one MIDI channel of one
/// track.
pub(super) struct ChannelState {
    /// Melodic bank selected via Bank Select LSB.
    instrument_bank: u16,
    /// Percussion bank, when this channel is routed to percussion.
    percussion_bank: Option<u16>,
    /// Whether the channel starts out as a percussion channel (channel 9).
    default_percussion: bool,
    /// Current program.
    instrument: u8,

    volume: u8,
    pan: u8,
    expression: u8,
    sustain: bool,
    soft: bool,
    modulation_depth: u8,
    modulation_speed: u8,
    pitch_bend_range: u8,
    portamento: bool,
    portamento_time: u8,
    last_pitch: Option<u8>,
    /// Pending filter settings applied to newly allocated voices.
    cutoff: Option<u8>,
    resonance: Option<u8>,

    /// Send depths toward the chorus/echo/reverb buses.
    pub(super) chorus_depth: u8,
    pub(super) echo_depth: u8,
    pub(super) reverb_depth: u8,

    selected: ParameterSelect,
    rpn: (u8, u8),
    nrpn: (u8, u8),

    voices: Vec<Voice>,
    /// Read cursor into this channel's event sequence.
    pub(super) cursor: usize,

    effects: Option<Box<ChannelEffects>>,
}

impl ChannelState {
    pub(super) fn new(percussion: bool, private_effects: bool) -> Self {
        Self {
            instrument_bank: 0,
            percussion_bank: percussion.then_some(0),
            default_percussion: percussion,
            instrument: 0,
            volume: 127,
            pan: 64,
            expression: 127,
            sustain: false,
            soft: false,
            modulation_depth: 0,
            modulation_speed: 64,
            pitch_bend_range: 2,
            portamento: false,
            portamento_time: 0,
            last_pitch: None,
            cutoff: None,
            resonance: None,
            chorus_depth: 0,
            echo_depth: 0,
            reverb_depth: 0,
            selected: ParameterSelect::None,
            rpn: (0, 0),
            nrpn: (0, 0),
            voices: Vec::new(),
            cursor: 0,
            effects: private_effects.then(|| Box::new(ChannelEffects::new())),
        }
    }

    /// Returns every controller to its start-of-stream value and drops all
    /// live voices.
    pub(super) fn reset(&mut self) {
        let private_effects = self.effects.is_some();
        *self = Self::new(self.default_percussion, private_effects);
    }

    /// A channel is in use once its cursor has advanced at least once.
    pub(super) fn is_in_use(&self) -> bool {
        self.cursor != 0
    }

    pub(super) fn live_voices(&self) -> usize {
        self.voices.len()
    }

    /// Applies one due event to the channel state.
    pub(super) fn handle_event(&mut self, event: &MidiEvent, library: &SampleLibrary) {
        match event.kind {
            EventKind::NoteOn => self.note_on(event.data[0], event.data[1], library),
            EventKind::NoteOff => self.note_off(event.data[0], event.data[1]),
            EventKind::Controller => self.controller(event.data[0], event.data[1]),
            EventKind::ProgramChange => self.instrument = event.data[0],
            EventKind::PitchBend => self.pitch_bend(event.data[0], event.data[1]),
            // Pressure messages are not mapped to any voice parameter.
            EventKind::KeyAftertouch | EventKind::ChannelPressure => {}
            // Meta and sysex are handled by the sequencer.
            EventKind::SystemExclusive | EventKind::Meta => {}
        }
    }

    fn note_on(&mut self, pitch: u8, velocity: u8, library: &SampleLibrary) {
        if velocity == 0 {
            // Note On with zero velocity is a release.
            self.note_off(pitch, 0);
            return;
        }
        if self.voices.len() >= MAX_POLYPHONICS {
            debug!(pitch, "Polyphony limit reached, dropping note");
            return;
        }

        let (bank, instrument, percussion) = match self.percussion_bank {
            Some(bank) => (PERCUSSION_BANK_OFFSET + bank, 0, true),
            None => (self.instrument_bank, self.instrument, false),
        };
        let Some(mut voice) = Voice::allocate(bank, instrument, pitch, velocity, library) else {
            return;
        };

        voice.set_soft(self.soft);
        if percussion {
            // Percussion plays out regardless of note length.
            voice.set_sustain(true);
        }
        if let Some(cutoff) = self.cutoff {
            voice.set_cutoff_frequency(filter_frequency(cutoff));
        }
        if let Some(resonance) = self.resonance {
            voice.set_resonance_frequency(filter_frequency(resonance));
        }
        if self.portamento {
            if let Some(from) = self.last_pitch {
                voice.set_portamento_from(f64::from(from), self.portamento_time);
            }
        }
        self.voices.push(voice);
        self.last_pitch = Some(pitch);
    }

    fn note_off(&mut self, pitch: u8, velocity: u8) {
        for voice in &mut self.voices {
            if voice.pitch() == f64::from(pitch) && !voice.is_releasing() {
                voice.release(velocity);
            }
        }
    }

    fn controller(&mut self, number: u8, value: u8) {
        match number {
            controller::VOLUME => self.volume = value,
            controller::PAN => self.pan = value,
            controller::EXPRESSION => self.expression = value,
            controller::HOLD_PEDAL => self.sustain = value > 63,
            controller::SOFT_PEDAL => self.soft = value > 63,
            controller::MODULATION_WHEEL_MSB => self.modulation_depth = value,
            controller::MODULATION_WHEEL_LSB => self.modulation_speed = value,
            controller::PORTAMENTO => self.portamento = value > 63,
            controller::PORTAMENTO_TIME => self.portamento_time = value,
            controller::BANK_SELECT_MSB => {
                // MSB 0x7f routes the channel to percussion.
                self.percussion_bank = (value == 0x7f).then_some(0);
            }
            controller::BANK_SELECT_LSB => self.instrument_bank = u16::from(value),
            controller::EFFECTS_LEVEL => {
                self.reverb_depth = value;
                if let Some(fx) = &mut self.effects {
                    fx.reverb.start(value);
                }
            }
            controller::CHORUS_DEPTH => {
                self.chorus_depth = value;
                if let Some(fx) = &mut self.effects {
                    fx.chorus.start(value);
                }
            }
            controller::CELESTE_LEVEL => {
                self.echo_depth = value;
                if let Some(fx) = &mut self.effects {
                    fx.echo.start(value);
                }
            }
            controller::RPN_LSB => {
                self.rpn.0 = value;
                self.selected = ParameterSelect::Registered;
                self.check_rpn_reset();
            }
            controller::RPN_MSB => {
                self.rpn.1 = value;
                self.selected = ParameterSelect::Registered;
                self.check_rpn_reset();
            }
            controller::NRPN_LSB => {
                self.nrpn.0 = value;
                self.selected = ParameterSelect::NonRegistered;
            }
            controller::NRPN_MSB => {
                self.nrpn.1 = value;
                self.selected = ParameterSelect::NonRegistered;
            }
            controller::DATA_ENTRY_MSB => self.data_entry(value),
            controller::DATA_ENTRY_LSB => {
                // No selected address takes a fine data byte.
            }
            other => {
                debug!(controller = other, value, "Ignoring unmapped controller");
            }
        }
    }

    /// RPN 0x7f/0x7f is the explicit "deselect" address.
    fn check_rpn_reset(&mut self) {
        if self.rpn == (0x7f, 0x7f) {
            self.selected = ParameterSelect::None;
        }
    }

    /// Commits a Data Entry MSB against the selected parameter address,
    /// then clears the selection so a stray later Data Entry cannot
    /// silently rewrite the same parameter.
    fn data_entry(&mut self, value: u8) {
        match self.selected {
            ParameterSelect::Registered => {
                // (MSB, LSB) = (0, 0) is pitch bend range.
                if self.rpn == (0, 0) {
                    self.pitch_bend_range = value;
                }
            }
            ParameterSelect::NonRegistered => match (self.nrpn.1, self.nrpn.0) {
                (0x01, 0x20) => self.cutoff = Some(value),
                (0x01, 0x21) => self.resonance = Some(value),
                (msb, lsb) => {
                    debug!(msb, lsb, value, "Ignoring unmapped NRPN address");
                }
            },
            ParameterSelect::None => {
                debug!(value, "Data entry with no parameter selected");
            }
        }
        self.selected = ParameterSelect::None;
    }

    /// Pitch bend steers only the most recently allocated live voice.
    fn pitch_bend(&mut self, lsb: u8, msb: u8) {
        let value = u16::from(lsb & 0x7f) | (u16::from(msb) << 7);
        let range = self.pitch_bend_range;
        if let Some(voice) = self.voices.last_mut() {
            voice.pitch_bend(value, range);
        }
    }

    /// Renders one frame: every live voice advances, finished voices are
    /// compacted away in order, and the sum is weighted by volume,
    /// expression and pan. Private effects (per-channel topology) run over
    /// the weighted output.
    pub(super) fn render(&mut self) -> (f64, f64) {
        let mut left_total = 0.0;
        let mut right_total = 0.0;
        // Percussion voices stay latched regardless of the pedal.
        let sustain = self.sustain || self.percussion_bank.is_some();
        let depth = self.modulation_depth;
        let speed = self.modulation_speed;
        self.voices.retain_mut(|voice| {
            voice.set_sustain(sustain);
            voice.set_modulation(depth, speed);
            match voice.render() {
                Some((left, right)) => {
                    left_total += left;
                    right_total += right;
                    true
                }
                None => false,
            }
        });

        let volume = f64::from(self.volume) / 127.0;
        let expression = f64::from(self.expression) / 127.0;
        let pan = f64::from(self.pan) / 127.0;
        let mut left = left_total * volume * expression * (1.0 - pan);
        let mut right = right_total * volume * expression * pan;

        if let Some(fx) = &mut self.effects {
            (left, right) = fx.chorus.process(left, right);
            (left, right) = fx.echo.process(left, right);
            (left, right) = fx.reverb.process(left, right);
        }
        (left, right)
    }
}

/// Maps a 7-bit filter parameter onto a frequency in Hz.
fn filter_frequency(value: u8) -> f64 {
    f64::from(value) / 127.0 * 8000.0
}

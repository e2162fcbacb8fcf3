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

//! The sequencer: walks MIDI events on a tick-accurate clock and pulls
//! audio out of the per-channel voice pools.
//!
//! Everything runs inside [`Synthesizer::prepare_buffer`]: there is no
//! thread inside the engine, and the call is not re-entrant. Loading is a
//! separate, non-real-time phase. The only state shared with other threads
//! is the peak meter, which is atomic.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{SendTopology, SynthConfig};
use crate::effects::{FxChorus, FxEcho, FxReverb};
use crate::midi::{
    EventKind, MidiFile, ParseError, MAX_MIDI_CHANNELS, META_CUE, META_END_OF_TRACK, META_LYRICS,
    META_MARKER, META_TEMPO, META_TEXT,
};
use crate::samples::{SampleLibrary, PERCUSSION_BANK_OFFSET};
use crate::synth::SAMPLE_RATE;

mod channel;
mod meter;

pub use channel::MAX_POLYPHONICS;
pub use meter::PeakMeter;

use channel::ChannelState;

/// Default tempo when no tempo meta event has arrived, in µs per quarter.
const DEFAULT_TEMPO: f64 = 500_000.0;

/// The percussion channel per the General MIDI convention.
const PERCUSSION_CHANNEL: usize = 9;

/// Master volume sysex payload prefix: `7f 7f 04 01 00 vv`.
const MASTER_VOLUME_PREFIX: [u8; 5] = [0x7f, 0x7f, 0x04, 0x01, 0x00];

/// Playback state for one track.
struct TrackState {
    ended: bool,
    channels: [ChannelState; MAX_MIDI_CHANNELS],
}

impl TrackState {
    fn new(topology: SendTopology) -> Self {
        let private = topology == SendTopology::PerChannel;
        Self {
            ended: false,
            channels: std::array::from_fn(|ch| {
                ChannelState::new(ch == PERCUSSION_CHANNEL, private)
            }),
        }
    }
}

/// Shared wet-only effect instances for the shared send topology.
struct SharedEffects {
    chorus: FxChorus,
    echo: FxEcho,
    reverb: FxReverb,
    chorus_on: bool,
    echo_on: bool,
    reverb_on: bool,
}

impl SharedEffects {
    fn new() -> Self {
        Self {
            chorus: FxChorus::new(true),
            echo: FxEcho::new(true),
            reverb: FxReverb::new(true),
            chorus_on: false,
            echo_on: false,
            reverb_on: false,
        }
    }
}

/// The MIDI-driven software synthesizer.
///
/// Load a song with [`Self::load_midi_file`], then repeatedly call
/// [`Self::prepare_buffer`] until it returns false.
pub struct Synthesizer {
    song: Option<Arc<MidiFile>>,
    tracks: Vec<TrackState>,
    library: SampleLibrary,
    topology: SendTopology,
    shared: Option<SharedEffects>,

    sample_clock: f64,
    samples_per_tick: f64,
    current_tick: i64,
    last_tick: i64,

    master_volume: f64,
    configured_master_volume: f64,

    meter: Arc<PeakMeter>,
    meter_counter: u32,
}

impl Synthesizer {
    pub fn new(config: &SynthConfig) -> Self {
        Self {
            song: None,
            tracks: Vec::new(),
            library: SampleLibrary::new(config.sample_store.clone()),
            topology: config.send_topology,
            shared: (config.send_topology == SendTopology::Shared).then(SharedEffects::new),
            sample_clock: 0.0,
            samples_per_tick: 1.0,
            current_tick: 0,
            last_tick: -1,
            master_volume: config.master_volume,
            configured_master_volume: config.master_volume,
            meter: Arc::new(PeakMeter::new()),
            meter_counter: 0,
        }
    }

    /// A handle to the output peak meter, safe to poll from another thread.
    pub fn peak_meter(&self) -> Arc<PeakMeter> {
        Arc::clone(&self.meter)
    }

    /// Parses a MIDI file and prepares playback: track state is rebuilt,
    /// the sample library is repopulated from the song's program changes,
    /// and the clock rewinds to the start.
    pub fn load_midi_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ParseError> {
        let file = MidiFile::open(path)?;
        info!(%file, "Loaded MIDI file");

        self.tracks = file
            .tracks
            .iter()
            .map(|_| TrackState::new(self.topology))
            .collect();

        // Preload every instrument the song asks for, plus the default
        // drum set and the piano.
        self.library.clear();
        for track in &file.tracks {
            for events in &track.channels {
                for event in events {
                    if event.kind == EventKind::ProgramChange {
                        self.library.load(0, event.data[0]);
                    }
                }
            }
        }
        self.library.load(PERCUSSION_BANK_OFFSET, 0);
        self.library.load(0, 0);

        self.song = Some(Arc::new(file));
        self.rewind();
        Ok(())
    }

    /// Returns playback to the start of the stream, resetting every
    /// channel, the clock and the meters.
    pub fn rewind(&mut self) {
        self.sample_clock = 0.0;
        self.current_tick = 0;
        self.last_tick = -1;
        self.samples_per_tick = self.default_samples_per_tick();
        self.master_volume = self.configured_master_volume;
        self.meter_counter = 0;
        self.meter.reset();
        for track in &mut self.tracks {
            track.ended = false;
            for channel in &mut track.channels {
                channel.reset();
            }
        }
        if let Some(shared) = &mut self.shared {
            *shared = SharedEffects::new();
        }
    }

    /// Fills the buffer with interleaved signed 16-bit little-endian
    /// stereo frames. Returns false once every track has ended; the caller
    /// stops invoking it then. Trailing space in the final buffer is
    /// silence.
    pub fn prepare_buffer(&mut self, buffer: &mut [u8]) -> bool {
        for frame in buffer.chunks_exact_mut(4) {
            let (left, right) = self.next_frame();
            frame[0..2].copy_from_slice(&left.to_le_bytes());
            frame[2..4].copy_from_slice(&right.to_le_bytes());
        }
        !self.tracks.is_empty() && self.tracks.iter().any(|t| !t.ended)
    }

    fn default_samples_per_tick(&self) -> f64 {
        let time_base = self
            .song
            .as_ref()
            .map_or(480.0, |song| f64::from(song.header.time_base.max(1)));
        DEFAULT_TEMPO * SAMPLE_RATE / 1_000_000.0 / time_base
    }

    fn next_frame(&mut self) -> (i16, i16) {
        self.current_tick = (self.sample_clock / self.samples_per_tick) as i64;
        self.sample_clock += 1.0;

        if self.current_tick != self.last_tick {
            self.last_tick = self.current_tick;
            self.dispatch_due_events();
            self.update_shared_sends();
        }

        let mut left = 0.0;
        let mut right = 0.0;
        let mut chorus_send = (0.0, 0.0);
        let mut echo_send = (0.0, 0.0);
        let mut reverb_send = (0.0, 0.0);
        for track in &mut self.tracks {
            for channel in &mut track.channels {
                let (l, r) = channel.render();
                left += l;
                right += r;
                if self.shared.is_some() {
                    let chorus = f64::from(channel.chorus_depth) / 127.0;
                    let echo = f64::from(channel.echo_depth) / 127.0;
                    let reverb = f64::from(channel.reverb_depth) / 127.0;
                    chorus_send.0 += l * chorus;
                    chorus_send.1 += r * chorus;
                    echo_send.0 += l * echo;
                    echo_send.1 += r * echo;
                    reverb_send.0 += l * reverb;
                    reverb_send.1 += r * reverb;
                }
            }
        }

        if let Some(shared) = &mut self.shared {
            let (wl, wr) = shared.chorus.process(chorus_send.0, chorus_send.1);
            left += wl;
            right += wr;
            let (wl, wr) = shared.echo.process(echo_send.0, echo_send.1);
            left += wl;
            right += wr;
            let (wl, wr) = shared.reverb.process(reverb_send.0, reverb_send.1);
            left += wl;
            right += wr;
        }

        left *= self.master_volume;
        right *= self.master_volume;
        let left = left.clamp(-32768.0, 32767.0) as i16;
        let right = right.clamp(-32768.0, 32767.0) as i16;

        self.meter.record(left, right);
        self.meter_counter += 1;
        if self.meter_counter == meter::METER_INTERVAL_SAMPLES {
            self.meter.advance();
            self.meter_counter = 0;
        }

        (left, right)
    }

    /// Applies every event whose tick is due on every channel of every
    /// track, in track/channel order.
    fn dispatch_due_events(&mut self) {
        let Some(song) = self.song.clone() else {
            return;
        };
        let tick = self.current_tick.max(0) as u64;

        for (t, track) in song.tracks.iter().enumerate() {
            for ch in 0..MAX_MIDI_CHANNELS {
                let events = &track.channels[ch];
                loop {
                    let cursor = self.tracks[t].channels[ch].cursor;
                    let Some(event) = events.get(cursor) else {
                        break;
                    };
                    if event.tick > tick {
                        break;
                    }
                    self.tracks[t].channels[ch].cursor += 1;
                    match event.kind {
                        EventKind::Meta => self.handle_meta(t, &event.data, song.header.time_base),
                        EventKind::SystemExclusive => self.handle_sysex(&event.data),
                        _ => self.tracks[t].channels[ch].handle_event(event, &self.library),
                    }
                }
            }
        }
    }

    fn handle_meta(&mut self, track: usize, data: &[u8], time_base: u16) {
        let (kind, payload) = match data.split_first() {
            Some(split) => split,
            None => return,
        };
        match *kind {
            META_LYRICS => {
                debug!(lyric = %String::from_utf8_lossy(payload), "Lyric");
            }
            META_MARKER => {
                info!(marker = %String::from_utf8_lossy(payload), "Marker");
            }
            META_TEXT..=META_CUE => {
                debug!(text = %String::from_utf8_lossy(payload), "Meta text");
            }
            META_END_OF_TRACK => {
                self.tracks[track].ended = true;
            }
            META_TEMPO => {
                let mut tempo = 0.0;
                for &byte in payload {
                    tempo = tempo * 256.0 + f64::from(byte);
                }
                self.samples_per_tick =
                    tempo * SAMPLE_RATE / 1_000_000.0 / f64::from(time_base.max(1));
                // Keep the already-elapsed ticks aligned under the new
                // tempo so playback continues without a jump.
                self.sample_clock = self.current_tick as f64 * self.samples_per_tick + 1.0;
                debug!(tempo, samples_per_tick = self.samples_per_tick, "Tempo change");
            }
            _ => {}
        }
    }

    fn handle_sysex(&mut self, data: &[u8]) {
        if data.len() >= 6 && data[..5] == MASTER_VOLUME_PREFIX {
            self.master_volume = f64::from(data[5]) / 127.0;
            debug!(master_volume = self.master_volume, "Master volume change");
        }
    }

    /// Brings the shared effect instances up or down to follow the
    /// channels' send depths. Parameters of an already-running effect stay
    /// fixed; depth weighting happens at the send mix.
    fn update_shared_sends(&mut self) {
        let Some(shared) = &mut self.shared else {
            return;
        };
        let mut chorus = false;
        let mut echo = false;
        let mut reverb = false;
        for track in &self.tracks {
            for channel in &track.channels {
                chorus |= channel.chorus_depth > 0;
                echo |= channel.echo_depth > 0;
                reverb |= channel.reverb_depth > 0;
            }
        }
        if chorus != shared.chorus_on {
            shared.chorus.start(if chorus { 127 } else { 0 });
            shared.chorus_on = chorus;
        }
        if echo != shared.echo_on {
            shared.echo.start(if echo { 127 } else { 0 });
            shared.echo_on = echo;
        }
        if reverb != shared.reverb_on {
            shared.reverb.start(if reverb { 127 } else { 0 });
            shared.reverb_on = reverb;
        }
    }

    /// Voices currently live on one channel, for diagnostics.
    #[cfg(test)]
    fn live_voices(&self, track: usize, channel: usize) -> usize {
        self.tracks[track].channels[channel].live_voices()
    }

    /// Whether any channel of any track has consumed events.
    pub fn is_playing(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.channels.iter().any(ChannelState::is_in_use))
    }
}

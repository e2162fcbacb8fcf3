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

//! Standard MIDI file decoding.
//!
//! The parser turns the chunked binary layout into immutable per-channel
//! event lists that the sequencer walks with a cursor per channel.

use std::fmt;
use std::fs;
use std::path::Path;

pub mod controller;
mod error;
mod parser;

pub use error::ParseError;

/// The number of MIDI channels in a track chunk.
pub const MAX_MIDI_CHANNELS: usize = 16;

/// Meta event: text.
pub const META_TEXT: u8 = 0x01;
/// Meta event: lyrics. Text metas from 0x01 through this value carry
/// printable payloads (copyright, track name, instrument name, lyrics).
pub const META_LYRICS: u8 = 0x05;
/// Meta event: marker.
pub const META_MARKER: u8 = 0x06;
/// Meta event: cue point.
pub const META_CUE: u8 = 0x07;
/// Meta event: end of track.
pub const META_END_OF_TRACK: u8 = 0x2f;
/// Meta event: tempo in microseconds per quarter note.
pub const META_TEMPO: u8 = 0x51;

/// The kind of a decoded MIDI event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Key released. Two data bytes: pitch, velocity.
    NoteOff,
    /// Key pressed. Two data bytes: pitch, velocity. Velocity zero is
    /// equivalent to NoteOff.
    NoteOn,
    /// Polyphonic key pressure. Two data bytes.
    KeyAftertouch,
    /// Controller change. Two data bytes: controller number, value.
    Controller,
    /// Program (instrument) change. One data byte.
    ProgramChange,
    /// Channel pressure. One data byte.
    ChannelPressure,
    /// Pitch bend. Two data bytes forming a 14-bit value, LSB first.
    PitchBend,
    /// System exclusive message. Data holds the payload, including the
    /// terminating 0xF7 marker.
    SystemExclusive,
    /// Meta event. The first data byte is the meta type, the rest is the
    /// payload.
    Meta,
}

impl EventKind {
    /// Maps a status byte to its event kind. Returns `None` for data bytes
    /// and for unknown system statuses.
    fn from_status(status: u8) -> Option<EventKind> {
        match status {
            0xf0 => Some(EventKind::SystemExclusive),
            0xff => Some(EventKind::Meta),
            _ => match status & 0xf0 {
                0x80 => Some(EventKind::NoteOff),
                0x90 => Some(EventKind::NoteOn),
                0xa0 => Some(EventKind::KeyAftertouch),
                0xb0 => Some(EventKind::Controller),
                0xc0 => Some(EventKind::ProgramChange),
                0xd0 => Some(EventKind::ChannelPressure),
                0xe0 => Some(EventKind::PitchBend),
                _ => None,
            },
        }
    }

    /// The number of fixed data bytes for channel events, or `None` for
    /// events with variable-length payloads.
    fn data_len(&self) -> Option<usize> {
        match self {
            EventKind::NoteOff
            | EventKind::NoteOn
            | EventKind::KeyAftertouch
            | EventKind::Controller
            | EventKind::PitchBend => Some(2),
            EventKind::ProgramChange | EventKind::ChannelPressure => Some(1),
            EventKind::SystemExclusive | EventKind::Meta => None,
        }
    }
}

/// A single time-stamped MIDI event. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    /// Absolute time of this event in MIDI ticks.
    pub tick: u64,
    /// The decoded event kind.
    pub kind: EventKind,
    /// The event's data bytes. Channel events carry one or two bytes, sysex
    /// and meta events carry their full payload.
    pub data: Vec<u8>,
}

/// A track chunk, split into one event list per MIDI channel. Meta and
/// system exclusive events land on channel 0, matching the synthesizer's
/// dispatch convention.
#[derive(Debug, Clone, Default)]
pub struct Track {
    /// Per-channel event lists, in file order.
    pub channels: [Vec<MidiEvent>; MAX_MIDI_CHANNELS],
}

impl Track {
    /// Total number of events across all channels.
    pub fn event_count(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }
}

/// The decoded header chunk of a MIDI file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// The file format: 0 is single track, 1 is synchronized multitrack.
    pub format: u16,
    /// The number of track chunks declared by the header.
    pub track_count: u16,
    /// MIDI ticks per quarter note.
    pub time_base: u16,
}

/// A fully parsed MIDI file.
#[derive(Debug, Clone)]
pub struct MidiFile {
    /// The header chunk.
    pub header: Header,
    /// The parsed track chunks.
    pub tracks: Vec<Track>,
}

impl MidiFile {
    /// Parses a MIDI file from raw bytes. Any malformed chunk aborts the
    /// parse and discards partial results.
    pub fn parse(bytes: &[u8]) -> Result<MidiFile, ParseError> {
        parser::parse(bytes)
    }

    /// Reads and parses a MIDI file from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MidiFile, ParseError> {
        let bytes = fs::read(path.as_ref())?;
        Self::parse(&bytes)
    }
}

impl fmt::Display for MidiFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "format {}, {} track(s), time base {}, {} event(s)",
            self.header.format,
            self.tracks.len(),
            self.header.time_base,
            self.tracks.iter().map(Track::event_count).sum::<usize>()
        )
    }
}

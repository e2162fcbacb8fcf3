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

//! The binary chunk parser for standard MIDI files.

use tracing::debug;

use super::{EventKind, Header, MidiEvent, MidiFile, ParseError, Track};

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";
const SYSEX_END: u8 = 0xf7;

/// A byte cursor over one track chunk. The track index is carried so errors
/// can say where the file went wrong.
struct TrackCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    track: usize,
}

impl<'a> TrackCursor<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(ParseError::UnexpectedEof(self.track))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < count {
            return Err(ParseError::UnexpectedEof(self.track));
        }
        let slice = &self.bytes[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Decodes a variable-length quantity: 7 bits per byte, big-endian,
    /// high bit set on every byte except the last. Strictly an unsigned
    /// decode, no two's-complement.
    fn read_vlq(&mut self) -> Result<u64, ParseError> {
        let mut value: u64 = 0;
        loop {
            let byte = self.read_u8()?;
            value = (value << 7) | u64::from(byte & 0x7f);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
    }
}

fn read_u16_be(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32_be(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Parses a complete MIDI file from raw bytes.
pub(super) fn parse(bytes: &[u8]) -> Result<MidiFile, ParseError> {
    if bytes.len() < 14 {
        return Err(ParseError::BadHeaderMagic);
    }
    if &bytes[0..4] != HEADER_MAGIC {
        return Err(ParseError::BadHeaderMagic);
    }
    let header_size = read_u32_be(bytes, 4);
    if header_size != 6 {
        return Err(ParseError::BadHeaderSize(header_size));
    }
    let header = Header {
        format: read_u16_be(bytes, 8),
        track_count: read_u16_be(bytes, 10),
        time_base: read_u16_be(bytes, 12),
    };

    let mut tracks = Vec::with_capacity(header.track_count as usize);
    let mut pos = 14;
    for index in 0..header.track_count as usize {
        if bytes.len() < pos + 8 {
            return Err(ParseError::UnexpectedEof(index));
        }
        if &bytes[pos..pos + 4] != TRACK_MAGIC {
            return Err(ParseError::BadTrackMagic(index));
        }
        let track_len = read_u32_be(bytes, pos + 4) as usize;
        pos += 8;
        if bytes.len() < pos + track_len {
            return Err(ParseError::UnexpectedEof(index));
        }
        tracks.push(parse_track(&bytes[pos..pos + track_len], index)?);
        pos += track_len;
    }

    debug!(
        format = header.format,
        tracks = tracks.len(),
        time_base = header.time_base,
        "Parsed MIDI file"
    );

    Ok(MidiFile { header, tracks })
}

/// Parses one track chunk: a sequence of (delta-time, event) pairs consumed
/// until the declared byte length is exhausted.
fn parse_track(bytes: &[u8], index: usize) -> Result<Track, ParseError> {
    let mut cursor = TrackCursor {
        bytes,
        pos: 0,
        track: index,
    };
    let mut track = Track::default();
    let mut tick: u64 = 0;
    // The status byte of the previous channel event, for running status.
    // Cleared by meta and system exclusive events, which may not be reused.
    let mut running_status: Option<u8> = None;

    while cursor.remaining() > 0 {
        tick += cursor.read_vlq()?;
        if cursor.remaining() == 0 {
            // A trailing delta time with no event is a truncated track.
            return Err(ParseError::UnexpectedEof(index));
        }

        let first = cursor.read_u8()?;
        let (status, mut data) = if first & 0x80 == 0 {
            // High bit clear: reuse the previous event's status byte.
            let status = running_status.ok_or(ParseError::IllegalRunningStatus(index))?;
            (status, vec![first])
        } else {
            (first, Vec::new())
        };

        let kind = EventKind::from_status(status).ok_or(ParseError::UnknownStatus {
            track: index,
            status,
        })?;
        let channel = match kind {
            EventKind::SystemExclusive | EventKind::Meta => 0,
            _ => (status & 0x0f) as usize,
        };

        match kind.data_len() {
            Some(len) => {
                while data.len() < len {
                    data.push(cursor.read_u8()?);
                }
                running_status = Some(status);
            }
            None if kind == EventKind::SystemExclusive => {
                let len = cursor.read_vlq()? as usize;
                data.extend_from_slice(cursor.read_bytes(len)?);
                if data.last().copied() != Some(SYSEX_END) {
                    return Err(ParseError::UnterminatedSysEx(index));
                }
                running_status = None;
            }
            None => {
                // Meta: type byte, then a VLQ-prefixed payload.
                data.push(cursor.read_u8()?);
                let len = cursor.read_vlq()? as usize;
                data.extend_from_slice(cursor.read_bytes(len)?);
                running_status = None;
            }
        }

        track.channels[channel].push(MidiEvent { tick, kind, data });
    }

    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::META_END_OF_TRACK;

    /// Encodes a value as a variable-length quantity, for round-trip tests.
    fn encode_vlq(mut value: u64) -> Vec<u8> {
        let mut bytes = vec![(value & 0x7f) as u8];
        value >>= 7;
        while value > 0 {
            bytes.insert(0, (value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        bytes
    }

    fn decode_vlq(bytes: &[u8]) -> u64 {
        let mut cursor = TrackCursor {
            bytes,
            pos: 0,
            track: 0,
        };
        cursor.read_vlq().unwrap()
    }

    fn header_bytes(track_count: u16, time_base: u16) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&track_count.to_be_bytes());
        bytes.extend_from_slice(&time_base.to_be_bytes());
        bytes
    }

    fn file_with_track(track_data: &[u8]) -> Vec<u8> {
        let mut bytes = header_bytes(1, 480);
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track_data);
        bytes
    }

    #[test]
    fn test_vlq_round_trip() {
        // Boundary values for every encoded length in [0, 2^28 - 1].
        let values = [
            0u64,
            1,
            0x7f,
            0x80,
            0x2000,
            0x3fff,
            0x4000,
            0x1f_ffff,
            0x20_0000,
            0xfff_ffff,
        ];
        for value in values {
            assert_eq!(decode_vlq(&encode_vlq(value)), value, "value {value}");
        }
        for value in (0..1 << 14).step_by(37) {
            assert_eq!(decode_vlq(&encode_vlq(value)), value);
        }
    }

    #[test]
    fn test_vlq_known_encodings() {
        assert_eq!(encode_vlq(0), vec![0x00]);
        assert_eq!(encode_vlq(0x7f), vec![0x7f]);
        assert_eq!(encode_vlq(0x80), vec![0x81, 0x00]);
        assert_eq!(encode_vlq(0xfff_ffff), vec![0xff, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn test_parse_simple_note_pair() {
        // Note on at tick 0, note off at tick 480, end of track.
        let file = file_with_track(&[
            0x00, 0x90, 69, 100, // NoteOn A4
            0x83, 0x60, 0x80, 69, 0, // delta 480, NoteOff
            0x00, 0xff, 0x2f, 0x00, // end of track
        ]);
        let parsed = parse(&file).unwrap();
        assert_eq!(parsed.header.time_base, 480);
        assert_eq!(parsed.tracks.len(), 1);

        let channel = &parsed.tracks[0].channels[0];
        assert_eq!(channel.len(), 3);
        assert_eq!(channel[0].kind, EventKind::NoteOn);
        assert_eq!(channel[0].tick, 0);
        assert_eq!(channel[0].data, vec![69, 100]);
        assert_eq!(channel[1].kind, EventKind::NoteOff);
        assert_eq!(channel[1].tick, 480);
        assert_eq!(channel[2].kind, EventKind::Meta);
        assert_eq!(channel[2].data, vec![META_END_OF_TRACK]);
    }

    #[test]
    fn test_parse_running_status() {
        // Second note omits the status byte.
        let file = file_with_track(&[
            0x00, 0x91, 60, 100, // NoteOn channel 1
            0x00, 64, 100, // running status NoteOn
            0x00, 0xff, 0x2f, 0x00,
        ]);
        let parsed = parse(&file).unwrap();
        let channel = &parsed.tracks[0].channels[1];
        assert_eq!(channel.len(), 2);
        assert_eq!(channel[1].kind, EventKind::NoteOn);
        assert_eq!(channel[1].data, vec![64, 100]);
    }

    #[test]
    fn test_running_status_after_meta_is_rejected() {
        let file = file_with_track(&[
            0x00, 0x90, 60, 100, //
            0x00, 0xff, 0x01, 0x02, b'h', b'i', // text meta
            0x00, 64, 100, // running status reuse across a meta
        ]);
        assert!(matches!(
            parse(&file),
            Err(ParseError::IllegalRunningStatus(0))
        ));
    }

    #[test]
    fn test_sysex_requires_end_marker() {
        let ok = file_with_track(&[
            0x00, 0xf0, 0x03, 0x01, 0x02, 0xf7, //
            0x00, 0xff, 0x2f, 0x00,
        ]);
        let parsed = parse(&ok).unwrap();
        assert_eq!(
            parsed.tracks[0].channels[0][0].kind,
            EventKind::SystemExclusive
        );

        let bad = file_with_track(&[0x00, 0xf0, 0x03, 0x01, 0x02, 0x03]);
        assert!(matches!(parse(&bad), Err(ParseError::UnterminatedSysEx(0))));
    }

    #[test]
    fn test_bad_header_magic() {
        assert!(matches!(
            parse(b"MThx\x00\x00\x00\x06\x00\x01\x00\x01\x01\xe0"),
            Err(ParseError::BadHeaderMagic)
        ));
    }

    #[test]
    fn test_bad_header_size() {
        let mut bytes = header_bytes(0, 480);
        bytes[7] = 7;
        assert!(matches!(parse(&bytes), Err(ParseError::BadHeaderSize(7))));
    }

    #[test]
    fn test_bad_track_magic() {
        let mut file = file_with_track(&[0x00, 0xff, 0x2f, 0x00]);
        let track_magic_at = 14;
        file[track_magic_at] = b'X';
        assert!(matches!(parse(&file), Err(ParseError::BadTrackMagic(0))));
    }

    #[test]
    fn test_truncated_track_is_rejected() {
        // Declared length runs past the end of the data.
        let mut file = header_bytes(1, 480);
        file.extend_from_slice(b"MTrk");
        file.extend_from_slice(&100u32.to_be_bytes());
        file.extend_from_slice(&[0x00, 0x90, 60]);
        assert!(matches!(parse(&file), Err(ParseError::UnexpectedEof(0))));
    }

    #[test]
    fn test_event_truncated_within_track() {
        // Track length is honored but the final event is cut short.
        let file = file_with_track(&[0x00, 0x90, 60]);
        assert!(matches!(parse(&file), Err(ParseError::UnexpectedEof(0))));
    }

    #[test]
    fn test_meta_and_channel_routing() {
        let file = file_with_track(&[
            0x00, 0xc5, 42, // program change on channel 5
            0x00, 0xff, 0x51, 0x03, 0x07, 0xa1, 0x20, // tempo meta
            0x00, 0xff, 0x2f, 0x00,
        ]);
        let parsed = parse(&file).unwrap();
        let track = &parsed.tracks[0];
        assert_eq!(track.channels[5][0].kind, EventKind::ProgramChange);
        assert_eq!(track.channels[5][0].data, vec![42]);
        // Metas land on channel 0.
        assert_eq!(track.channels[0][0].kind, EventKind::Meta);
        assert_eq!(track.channels[0][0].data, vec![0x51, 0x07, 0xa1, 0x20]);
    }
}

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

/// Typed error for MIDI file decode failures. All of these are fatal to the
/// load: partial results are discarded and the caller gets a single error.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("I/O error reading MIDI file: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad header magic, not a MIDI file")]
    BadHeaderMagic,
    #[error("header declares size {0}, expected 6")]
    BadHeaderSize(u32),
    #[error("bad track magic in track {0}")]
    BadTrackMagic(usize),
    #[error("unexpected end of data in track {0}")]
    UnexpectedEof(usize),
    #[error("running status reused after a meta or system exclusive event in track {0}")]
    IllegalRunningStatus(usize),
    #[error("unknown status byte {status:#04x} in track {track}")]
    UnknownStatus { track: usize, status: u8 },
    #[error("system exclusive payload missing the 0xF7 end marker in track {0}")]
    UnterminatedSysEx(usize),
}

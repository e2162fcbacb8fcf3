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

//! General MIDI program substitution.
//!
//! The sample store does not cover the full General MIDI set. Programs
//! without recordings are remapped to the closest sampled instrument before
//! any library access. The table is a pure, stateless mapping.

/// Substitution table indexed by General MIDI program number.
const SUBSTITUTION: [u8; 128] = [
    // Pianos.
    0, 1, 2, 3, 4, 5, 5, 5, //
    // Chromatic percussion.
    10, 9, 10, 11, 12, 12, 14, 46, //
    // Organs.
    16, 17, 17, 17, 21, 21, 22, 21, //
    // Guitars.
    24, 25, 25, 25, 28, 29, 30, 31, //
    // Basses.
    32, 33, 34, 35, 36, 36, 34, 34, //
    // Strings.
    40, 40, 42, 42, 45, 45, 46, 46, //
    // Ensemble and choir.
    48, 48, 48, 48, 52, 53, 53, 55, //
    // Brass.
    56, 56, 56, 56, 56, 61, 61, 61, //
    // Reeds.
    64, 65, 65, 65, 68, 68, 68, 71, //
    // Pipes.
    73, 73, 73, 75, 73, 10, 73, 73, //
    // Synth leads.
    80, 81, 36, 36, 29, 52, 80, 36, //
    // Synth pads.
    53, 89, 99, 99, 99, 99, 99, 99, //
    // Synth effects.
    99, 99, 99, 99, 100, 99, 99, 99, //
    // Ethnic instruments.
    12, 12, 12, 46, 12, 73, 40, 40, //
    // Percussive.
    10, 113, 114, 115, 117, 117, 117, 10, //
    // Sound effects.
    120, 121, 10, 10, 10, 10, 10, 10,
];

/// Maps a General MIDI program number to the nearest sampled instrument.
pub fn substitute_program(program: u8) -> u8 {
    SUBSTITUTION[(program % 128) as usize]
}

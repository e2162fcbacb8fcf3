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

//! Controller numbers handled by the channel state machine. Unlisted
//! controllers are accepted and ignored.

pub const BANK_SELECT_MSB: u8 = 0;
pub const MODULATION_WHEEL_MSB: u8 = 1;
pub const PORTAMENTO_TIME: u8 = 5;
pub const DATA_ENTRY_MSB: u8 = 6;
pub const VOLUME: u8 = 7;
pub const PAN: u8 = 10;
pub const EXPRESSION: u8 = 11;
pub const BANK_SELECT_LSB: u8 = 32;
pub const MODULATION_WHEEL_LSB: u8 = 33;
pub const DATA_ENTRY_LSB: u8 = 38;
pub const HOLD_PEDAL: u8 = 64;
pub const PORTAMENTO: u8 = 65;
pub const SOFT_PEDAL: u8 = 67;
/// Reverb send depth (Yamaha XG uses the effects level controller for this).
pub const EFFECTS_LEVEL: u8 = 91;
pub const CHORUS_DEPTH: u8 = 93;
/// Echo send depth (Yamaha XG uses the celeste level controller for this).
pub const CELESTE_LEVEL: u8 = 94;
pub const NRPN_LSB: u8 = 98;
pub const NRPN_MSB: u8 = 99;
pub const RPN_LSB: u8 = 100;
pub const RPN_MSB: u8 = 101;

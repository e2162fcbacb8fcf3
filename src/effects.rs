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

//! Stereo send effects: chorus, echo and reverb.
//!
//! Every effect follows the same protocol: `start(depth)` configures and
//! enables it (depth 0 disables), `process(left, right)` maps one input
//! frame to one output frame. An effect built wet-only emits just the
//! processed signal, for use as a shared send instance whose output is
//! mixed over the dry bus; otherwise the dry input is included in the
//! output and a disabled effect is a pass-through.

mod chorus;
mod echo;
mod reverb;

pub use chorus::FxChorus;
pub use echo::FxEcho;
pub use reverb::FxReverb;

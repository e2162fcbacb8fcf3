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

//! Loop-point detection for sustained sample playback.
//!
//! The loop window is anchored on matching negative-to-positive zero
//! crossings of the left channel so that wrapping from the end back to the
//! start does not produce an audible click. Positions carry sub-sample
//! precision from linear interpolation between the bracketing samples.

use crate::synth::SAMPLE_RATE;

/// How many oscillation cycles to step back from the loop end to place the
/// loop start.
const LOOP_SPAN_CYCLES: f64 = 200.0;

/// Finds `(loop_start, loop_end)` for a sample with the given base
/// frequency. Returns `None` when the data is too short to hold the window.
pub(super) fn detect_loop(left: &[i16], base_frequency: f64) -> Option<(f64, f64)> {
    if left.len() < 4 || base_frequency <= 0.0 {
        return None;
    }
    let cycle = SAMPLE_RATE / base_frequency;

    // Walk back from the last sample across roughly two cycles to find the
    // local amplitude minimum.
    let mut pos = left.len() - 1;
    let mut min_pos = pos;
    let mut min_value = left[pos];
    let mut span = (cycle * 2.0) as usize;
    while span > 0 && pos > 0 {
        if left[pos] < min_value {
            min_pos = pos;
            min_value = left[pos];
        }
        pos -= 1;
        span -= 1;
    }

    // From the minimum, keep walking back to the nearest point where the
    // signal comes up from negative territory.
    pos = min_pos;
    while pos > 0 && left[pos] < 0 {
        pos -= 1;
    }
    let loop_end = crossing_at(left, pos.min(left.len() - 2))?;

    // Step back a couple hundred cycles and find the matching crossing in
    // the same direction.
    let back = loop_end - cycle * LOOP_SPAN_CYCLES;
    if back < 1.0 {
        return None;
    }
    let mut start = back as usize;
    let loop_start = if left[start] > 0 {
        // Landed in the positive half: walk forward to where it dips
        // negative, then interpolate that crossing.
        while start + 1 < left.len() && left[start] > 0 {
            start += 1;
        }
        let prev = f64::from(left[start - 1]);
        let here = f64::from(left[start]);
        if here >= 0.0 || prev == here {
            start as f64
        } else {
            start as f64 - (-here) / (-here + prev)
        }
    } else {
        // Landed in the negative half: walk back to the crossing.
        while start > 0 && left[start] < 0 {
            start -= 1;
        }
        crossing_at(left, start.min(left.len() - 2))?
    };

    if loop_start < loop_end {
        Some((loop_start, loop_end))
    } else {
        None
    }
}

/// Sub-sample position of the zero crossing between `pos` (non-negative)
/// and `pos + 1` (negative), by linear interpolation.
fn crossing_at(left: &[i16], pos: usize) -> Option<f64> {
    let here = f64::from(*left.get(pos)?);
    let next = f64::from(*left.get(pos + 1)?);
    if here == next {
        return Some(pos as f64);
    }
    Some(pos as f64 + here / (here - next))
}

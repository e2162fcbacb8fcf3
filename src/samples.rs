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

//! The waveform sample library.
//!
//! Sampled instruments live in a store laid out as
//! `<root>/Bank<bank>/<instrument>/` with one or more sample files per
//! instrument. A file name encodes its nominal pitch, the pitch range it
//! covers and an optional loop/sustain marker: `S_F_T[_L].pcm` or `.wav`,
//! where `L == 1` marks a loopable sample and `L == 2` marks a sample that
//! plays to its end regardless of Note Off. Percussion banks are stored at
//! an offset of 512 (`Bank512` is percussion bank 0).
//!
//! Loading is a preparatory, non-real-time phase: the library is populated
//! while a song is loaded, and voices only take shared references to the
//! decoded PCM afterwards.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

mod gm_map;
mod loader;
mod loop_points;

pub use gm_map::substitute_program;

/// Banks at or above this number hold percussion sets.
pub const PERCUSSION_BANK_OFFSET: u16 = 512;

/// Typed error for sample file decode failures. These never abort playback;
/// the affected instrument simply produces no sample-based voices.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("I/O error reading sample: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported wave encoding in {path}: {reason}")]
    UnsupportedWav { path: PathBuf, reason: String },
}

/// A decoded instrument sample: owned stereo PCM plus the pitch range it
/// covers and its loop window.
#[derive(Debug)]
pub struct WaveformSample {
    /// The bank this sample belongs to.
    pub bank: u16,
    /// The instrument this sample belongs to.
    pub instrument: u8,
    /// The nominal pitch of the recording (69 = A4).
    pub pitch: f64,
    /// Lowest pitch this sample should be used for.
    pub pitch_from: f64,
    /// Highest pitch this sample should be used for.
    pub pitch_to: f64,
    /// Frequency of the nominal pitch.
    pub base_frequency: f64,
    /// Whether playback should wrap inside the loop window.
    pub looped: bool,
    /// Whether Note Off is ignored and the sample always plays to its end.
    pub always_sustain: bool,
    /// Loop start position, with sub-sample precision. Only meaningful when
    /// `looped` is set; always strictly less than `loop_end`.
    pub loop_start: f64,
    /// Loop end position, with sub-sample precision.
    pub loop_end: f64,
    /// Left channel PCM.
    pub left: Vec<i16>,
    /// Right channel PCM.
    pub right: Vec<i16>,
}

impl WaveformSample {
    /// Number of frames in this sample.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// True when the sample holds no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Whether this sample covers the given pitch.
    pub fn covers(&self, pitch: f64) -> bool {
        self.pitch_from <= pitch && pitch <= self.pitch_to
    }

    /// Memory held by the PCM data, in bytes.
    pub fn memory_size(&self) -> usize {
        (self.left.len() + self.right.len()) * std::mem::size_of::<i16>()
    }
}

/// Loads, indexes and caches instrument samples from a store directory.
pub struct SampleLibrary {
    /// The store root directory.
    root: PathBuf,
    /// Decoded samples by (bank, instrument). An entry present means the
    /// pair has been loaded; loading it again is a no-op.
    banks: HashMap<(u16, u8), Vec<Arc<WaveformSample>>>,
}

impl SampleLibrary {
    /// Creates an empty library over the given store root.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            banks: HashMap::new(),
        }
    }

    /// Loads every sample file for the given (bank, instrument) pair.
    /// Returns false when the store has nothing usable for the pair; this is
    /// not fatal, the instrument will just play silently. Loading an already
    /// loaded pair is a no-op returning true.
    pub fn load(&mut self, bank: u16, instrument: u8) -> bool {
        let instrument = if bank == 0 {
            substitute_program(instrument)
        } else {
            instrument
        };

        if self.banks.contains_key(&(bank, instrument)) {
            return true;
        }

        let dir = self
            .root
            .join(format!("Bank{}", bank))
            .join(instrument.to_string());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?dir, error = %e, "No sample directory for instrument");
                return false;
            }
        };

        let mut samples = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            let parsed = match loader::parse_file_name(name) {
                Some(parsed) => parsed,
                // Files that don't follow the naming convention are skipped.
                None => continue,
            };

            match loader::read_sample(&path, bank, instrument, parsed) {
                Ok(sample) => {
                    debug!(
                        path = ?path,
                        pitch = sample.pitch,
                        frames = sample.len(),
                        looped = sample.looped,
                        "Loaded sample"
                    );
                    samples.push(Arc::new(sample));
                }
                Err(e) => {
                    warn!(path = ?path, error = %e, "Failed to load sample file");
                    return false;
                }
            }
        }

        info!(
            bank,
            instrument,
            files = samples.len(),
            "Instrument samples loaded"
        );
        self.banks.insert((bank, instrument), samples);
        true
    }

    /// Finds the sample covering the given pitch for an instrument.
    pub fn lookup(&self, bank: u16, instrument: u8, pitch: f64) -> Option<Arc<WaveformSample>> {
        let instrument = if bank == 0 {
            substitute_program(instrument)
        } else {
            instrument
        };
        self.banks
            .get(&(bank, instrument))?
            .iter()
            .find(|s| s.covers(pitch))
            .cloned()
    }

    /// Drops every cached sample. Called between songs.
    pub fn clear(&mut self) {
        self.banks.clear();
    }

    /// Total memory used by decoded PCM, in bytes.
    pub fn memory_size(&self) -> usize {
        self.banks
            .values()
            .flatten()
            .map(|s| s.memory_size())
            .sum()
    }

    /// The (bank, instrument) pairs currently cached.
    pub fn loaded_instruments(&self) -> impl Iterator<Item = (u16, u8, usize)> + '_ {
        self.banks
            .iter()
            .map(|((bank, instrument), samples)| (*bank, *instrument, samples.len()))
    }
}

impl std::fmt::Debug for SampleLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLibrary")
            .field("root", &self.root)
            .field("instruments", &self.banks.len())
            .field("memory_kb", &(self.memory_size() / 1024))
            .finish()
    }
}

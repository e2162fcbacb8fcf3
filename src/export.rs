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

//! Rendering a loaded song to a WAV file.

use std::io::Write;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use crate::engine::Synthesizer;
use crate::synth::SAMPLE_RATE;

/// Frames rendered per engine call while exporting.
const CHUNK_FRAMES: usize = 4096;

/// Errors producing an output file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unable to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to write wav: {0}")]
    Wav(#[from] hound::Error),
}

fn output_spec() -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE as u32,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Renders the synthesizer's loaded song to a 16-bit stereo WAV file at
/// the given path. Returns the number of frames written.
pub fn render_wav<P: AsRef<Path>>(synth: &mut Synthesizer, path: P) -> Result<u64, ExportError> {
    let mut writer = WavWriter::create(path.as_ref(), output_spec())?;
    let mut buffer = vec![0u8; CHUNK_FRAMES * 4];
    let mut frames: u64 = 0;

    loop {
        let more = synth.prepare_buffer(&mut buffer);
        for sample in buffer.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        frames += CHUNK_FRAMES as u64;
        if !more {
            break;
        }
    }

    writer.finalize()?;
    info!(path = ?path.as_ref(), frames, "Rendered WAV file");
    Ok(frames)
}

/// Renders the loaded song as raw interleaved 16-bit little-endian stereo
/// frames to any writer. Returns the number of frames written.
pub fn render_raw<W: Write>(synth: &mut Synthesizer, mut out: W) -> Result<u64, ExportError> {
    let mut buffer = vec![0u8; CHUNK_FRAMES * 4];
    let mut frames: u64 = 0;

    loop {
        let more = synth.prepare_buffer(&mut buffer);
        out.write_all(&buffer)?;
        frames += CHUNK_FRAMES as u64;
        if !more {
            break;
        }
    }
    out.flush()?;
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use hound::WavReader;

    use super::*;
    use crate::config::SynthConfig;

    /// A one-track song holding A4 for one quarter note at time base 480.
    fn one_note_song() -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&480u16.to_be_bytes());

        let track: &[u8] = &[
            0x00, 0x90, 69, 100, // NoteOn A4
            0x83, 0x60, 0x80, 69, 64, // delta 480, NoteOff
            0x00, 0xff, 0x2f, 0x00, // end of track
        ];
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(track.len() as u32).to_be_bytes());
        bytes.extend_from_slice(track);
        bytes
    }

    fn loaded_synth(dir: &Path) -> Synthesizer {
        let song = dir.join("song.mid");
        std::fs::write(&song, one_note_song()).unwrap();
        let config = SynthConfig {
            sample_store: PathBuf::from("no-such-store"),
            ..SynthConfig::default()
        };
        let mut synth = Synthesizer::new(&config);
        synth.load_midi_file(&song).unwrap();
        synth
    }

    #[test]
    fn test_wav_export_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut synth = loaded_synth(tmp.path());

        let out = tmp.path().join("song.wav");
        let frames = render_wav(&mut synth, &out).expect("render succeeds");
        assert!(frames >= 22_050, "too few frames: {frames}");

        let mut reader = WavReader::open(&out).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(u64::from(reader.duration()), frames);

        let any_signal = reader
            .samples::<i16>()
            .filter_map(Result::ok)
            .any(|s| s != 0);
        assert!(any_signal, "exported file is all silence");
    }

    #[test]
    fn test_raw_export_matches_wav_length() {
        let tmp = tempfile::tempdir().unwrap();
        let mut synth = loaded_synth(tmp.path());

        let mut raw = Vec::new();
        let frames = render_raw(&mut synth, &mut raw).expect("render succeeds");
        assert_eq!(raw.len() as u64, frames * 4);
        assert!(raw.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_rewound_synth_exports_identical_audio() {
        let tmp = tempfile::tempdir().unwrap();
        let mut synth = loaded_synth(tmp.path());

        let mut first = Vec::new();
        render_raw(&mut synth, &mut first).unwrap();
        synth.rewind();
        let mut second = Vec::new();
        render_raw(&mut synth, &mut second).unwrap();
        assert_eq!(first, second);
    }
}

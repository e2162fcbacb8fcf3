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

//! Sample file decoding.
//!
//! A sample file is either a RIFF/WAVE container (PCM, 16-bit, 44,100 Hz,
//! mono or stereo; anything else is rejected) or a headerless raw blob of
//! interleaved 16-bit little-endian stereo PCM.

use std::io::Cursor;
use std::path::Path;

use super::{loop_points, SampleError, WaveformSample};
use crate::synth::SAMPLE_RATE;

/// Metadata encoded in a sample file name: `S_F_T[_L].pcm` or `.wav`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SampleFileName {
    /// Nominal pitch of the recording.
    pub pitch: u8,
    /// Lowest pitch the sample covers.
    pub pitch_from: u8,
    /// Highest pitch the sample covers.
    pub pitch_to: u8,
    /// `_1` marker: playback loops.
    pub looped: bool,
    /// `_2` marker: Note Off is ignored.
    pub always_sustain: bool,
}

/// Parses the `S_F_T[_L]` file name convention. Returns `None` for files
/// that don't follow it, which are skipped rather than treated as errors.
pub(super) fn parse_file_name(name: &str) -> Option<SampleFileName> {
    let (stem, extension) = name.rsplit_once('.')?;
    if !extension.eq_ignore_ascii_case("pcm") && !extension.eq_ignore_ascii_case("wav") {
        return None;
    }

    let mut parts = stem.split('_');
    let pitch: u8 = parts.next()?.parse().ok()?;
    let pitch_from: u8 = parts.next()?.parse().ok()?;
    let pitch_to: u8 = parts.next()?.parse().ok()?;
    if pitch == 0 || pitch > 127 || pitch_from > pitch_to {
        return None;
    }

    let flag = parts.next();
    Some(SampleFileName {
        pitch,
        pitch_from,
        pitch_to,
        looped: flag == Some("1"),
        always_sustain: flag == Some("2"),
    })
}

/// Reads and decodes one sample file, detecting loop points when the name
/// asks for them.
pub(super) fn read_sample(
    path: &Path,
    bank: u16,
    instrument: u8,
    name: SampleFileName,
) -> Result<WaveformSample, SampleError> {
    let bytes = std::fs::read(path)?;

    let (left, right) = if bytes.starts_with(b"RIFF") {
        decode_wav(path, &bytes)?
    } else {
        decode_raw(&bytes)
    };

    let base_frequency = 440.0 * 2f64.powf((f64::from(name.pitch) - 69.0) / 12.0);
    let (loop_start, loop_end) = if name.looped {
        loop_points::detect_loop(&left, base_frequency).unwrap_or((0.0, 0.0))
    } else {
        (0.0, 0.0)
    };

    Ok(WaveformSample {
        bank,
        instrument,
        pitch: f64::from(name.pitch),
        pitch_from: f64::from(name.pitch_from),
        pitch_to: f64::from(name.pitch_to),
        base_frequency,
        // A loop window that could not be detected falls back to plain
        // run-to-end playback.
        looped: name.looped && loop_start < loop_end,
        always_sustain: name.always_sustain,
        loop_start,
        loop_end,
        left,
        right,
    })
}

/// Decodes a RIFF/WAVE container, enforcing the store's fixed format.
fn decode_wav(path: &Path, bytes: &[u8]) -> Result<(Vec<i16>, Vec<i16>), SampleError> {
    let unsupported = |reason: String| SampleError::UnsupportedWav {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| unsupported(format!("unreadable wave container: {e}")))?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(unsupported(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    if spec.sample_rate != SAMPLE_RATE as u32 {
        return Err(unsupported(format!(
            "expected {} Hz, got {} Hz",
            SAMPLE_RATE as u32, spec.sample_rate
        )));
    }
    if spec.channels != 1 && spec.channels != 2 {
        return Err(unsupported(format!(
            "expected mono or stereo, got {} channels",
            spec.channels
        )));
    }

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|e| unsupported(format!("bad sample data: {e}")))?;

    if spec.channels == 1 {
        // Mono is duplicated to both channels.
        Ok((samples.clone(), samples))
    } else {
        let mut left = Vec::with_capacity(samples.len() / 2);
        let mut right = Vec::with_capacity(samples.len() / 2);
        for frame in samples.chunks_exact(2) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
        Ok((left, right))
    }
}

/// Decodes a headerless raw blob as interleaved 16-bit LE stereo.
fn decode_raw(bytes: &[u8]) -> (Vec<i16>, Vec<i16>) {
    let frames = bytes.len() / 4;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in bytes.chunks_exact(4) {
        left.push(i16::from_le_bytes([frame[0], frame[1]]));
        right.push(i16::from_le_bytes([frame[2], frame[3]]));
    }
    (left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name() {
        assert_eq!(
            parse_file_name("69_60_80.pcm"),
            Some(SampleFileName {
                pitch: 69,
                pitch_from: 60,
                pitch_to: 80,
                looped: false,
                always_sustain: false,
            })
        );
        assert_eq!(
            parse_file_name("69_60_80_1.WAV"),
            Some(SampleFileName {
                pitch: 69,
                pitch_from: 60,
                pitch_to: 80,
                looped: true,
                always_sustain: false,
            })
        );
        assert!(parse_file_name("42_42_42_2.pcm").unwrap().always_sustain);
    }

    #[test]
    fn test_parse_file_name_rejects_malformed() {
        assert_eq!(parse_file_name("readme.txt"), None);
        assert_eq!(parse_file_name("69_60.pcm"), None);
        assert_eq!(parse_file_name("0_0_127.pcm"), None);
        assert_eq!(parse_file_name("69_80_60.pcm"), None);
        assert_eq!(parse_file_name("notes_a_b.wav"), None);
    }

    #[test]
    fn test_decode_raw_stereo() {
        let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80, 0xff, 0x7f];
        let (left, right) = decode_raw(&bytes);
        assert_eq!(left, vec![1, i16::MIN]);
        assert_eq!(right, vec![-1, i16::MAX]);
    }

    #[test]
    fn test_decode_wav_mono_duplicates_channels() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("60_0_127.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for value in [100i16, -100, 200] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let name = parse_file_name("60_0_127.wav").unwrap();
        let sample = read_sample(&path, 0, 0, name).unwrap();
        assert_eq!(sample.left, vec![100, -100, 200]);
        assert_eq!(sample.right, sample.left);
    }

    #[test]
    fn test_decode_wav_rejects_wrong_rate() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("60_0_127.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.write_sample(0i16).unwrap();
        writer.finalize().unwrap();

        let name = parse_file_name("60_0_127.wav").unwrap();
        let result = read_sample(&path, 0, 0, name);
        assert!(matches!(result, Err(SampleError::UnsupportedWav { .. })));
    }
}

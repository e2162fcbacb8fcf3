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
mod config;
mod effects;
mod engine;
mod export;
mod midi;
mod samples;
mod synth;

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use tracing::{debug, warn};

use config::SynthConfig;
use engine::Synthesizer;
use midi::MidiFile;
use samples::{SampleLibrary, PERCUSSION_BANK_OFFSET};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A MIDI file software synthesizer."
)]
struct Cli {
    /// The path to the synthesizer config.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parses a MIDI file and prints a summary of its contents.
    Info {
        /// The path to the MIDI file.
        midi_path: PathBuf,
    },
    /// Renders a MIDI file to an audio file.
    Render {
        /// The path to the MIDI file.
        midi_path: PathBuf,
        /// The path of the audio file to write.
        output_path: PathBuf,
        /// Write raw interleaved 16-bit little-endian stereo frames
        /// instead of a WAV file.
        #[arg(long)]
        raw: bool,
    },
    /// Loads the sample store and reports what it contains.
    Samples {},
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SynthConfig::load(path)?,
        None => SynthConfig::default(),
    };

    match cli.command {
        Commands::Info { midi_path } => {
            let file = MidiFile::open(&midi_path)?;
            println!("{}: {}", midi_path.display(), file);
            for (index, track) in file.tracks.iter().enumerate() {
                println!("- track {}: {} event(s)", index, track.event_count());
            }
        }
        Commands::Render {
            midi_path,
            output_path,
            raw,
        } => {
            let mut synth = Synthesizer::new(&config);
            synth.load_midi_file(&midi_path)?;

            // Log output levels from another thread while the render runs,
            // the way a live front end would poll them.
            let meter = synth.peak_meter();
            let stop = Arc::new(AtomicBool::new(false));
            let monitor = {
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let (left, right) = meter.read();
                        if left > 0 || right > 0 {
                            debug!(left, right, "Output level");
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                })
            };

            let result = if raw {
                let out = BufWriter::new(File::create(&output_path)?);
                export::render_raw(&mut synth, out)
            } else {
                export::render_wav(&mut synth, &output_path)
            };
            stop.store(true, Ordering::Relaxed);
            if monitor.join().is_err() {
                warn!("Level monitor thread panicked");
            }

            let frames = result?;
            if !synth.is_playing() {
                warn!("The song contained no playable events");
            }
            println!(
                "Rendered {} frame(s) ({:.1}s) to {}.",
                frames,
                frames as f64 / synth::SAMPLE_RATE,
                output_path.display()
            );
        }
        Commands::Samples {} => {
            let mut library = SampleLibrary::new(config.sample_store.clone());
            for instrument in 0..=127 {
                library.load(0, instrument);
            }
            library.load(PERCUSSION_BANK_OFFSET, 0);

            let mut loaded: Vec<(u16, u8, usize)> = library
                .loaded_instruments()
                .filter(|(_, _, files)| *files > 0)
                .collect();
            if loaded.is_empty() {
                println!("No samples found in {}.", config.sample_store.display());
                return Ok(());
            }

            loaded.sort_unstable();
            println!("Instruments (count: {}):", loaded.len());
            for (bank, instrument, files) in loaded {
                println!("- bank {} instrument {}: {} file(s)", bank, instrument, files);
            }
            println!(
                "\nTotal decoded sample memory: {} KiB.",
                library.memory_size() / 1024
            );
        }
    }

    Ok(())
}

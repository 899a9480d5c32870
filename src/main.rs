//! drumroll - Renders step-sequenced drum songs to WAV.
//!
//! A song file lists a tempo, a kit of WAV samples, a set of patterns written
//! as rhythms (`X...X...`) and a flow that strings the patterns together.
//!
//! # Usage
//!
//! ```bash
//! drumroll song.yml                  # writes song.wav
//! drumroll song.yml out.wav --split  # writes out-bass.wav, out-snare.wav, ...
//! drumroll song.yml -p Chorus        # renders only the Chorus pattern
//! ```
//!
//! Set `RUST_LOG=debug` to see what the renderer is doing.

use anyhow::{bail, Context, Result};
use clap::{crate_version, Parser};
use drumroll::optimizer::DEFAULT_CHUNK_STEPS;
use drumroll::render::{default_output_path, render_file, RenderOptions};
use std::path::PathBuf;

/// Command-line options for the renderer.
#[derive(Parser)]
#[clap(
    author = "Max Woolf",
    version = crate_version!(),
    about = "Renders step-sequenced drum songs to WAV."
)]
struct Cli {
    /// The song file to render.
    input: PathBuf,
    /// Where to write the WAV file. Defaults to the song file with a .wav extension.
    output: Option<PathBuf>,
    /// Write one WAV file per track instead of a single mix.
    #[arg(short, long)]
    split: bool,
    /// Render only this pattern, once.
    #[arg(short, long)]
    pattern: Option<String>,
    /// Directory that sound paths are relative to. Defaults to the song file's directory.
    #[arg(short, long)]
    base_path: Option<PathBuf>,
    /// Longest pattern chunk the optimizer produces, in steps.
    #[arg(long, default_value_t = DEFAULT_CHUNK_STEPS)]
    chunk_steps: usize,
    /// Render the song as written, without optimizing it first.
    #[arg(long)]
    no_optimize: bool,
}

impl Cli {
    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            split: self.split,
            pattern: self.pattern.clone(),
            base_path: self.base_path.clone(),
            chunk_steps: self.chunk_steps,
            optimize: !self.no_optimize,
        }
    }
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if cli.chunk_steps == 0 {
        bail!("--chunk-steps must be at least 1");
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    if output == cli.input {
        bail!(
            "Refusing to overwrite the song file {}",
            cli.input.display()
        );
    }

    let rendered = render_file(&cli.input, &output, &cli.render_options())
        .with_context(|| format!("Failed to render {}", cli.input.display()))?;

    for file in &rendered {
        println!(
            "{}: {:.2}s ({} frames)",
            file.path.display(),
            file.summary.duration_secs,
            file.summary.frames
        );
    }

    Ok(())
}

//! Render driver: song file in, WAV file(s) out.

use crate::audio::{AudioEngine, Kit, RenderSummary, WavSink, SAMPLE_RATE};
use crate::error::{DrumrollError, Result};
use crate::model::Song;
use crate::optimizer::{optimize, DEFAULT_CHUNK_STEPS};
use crate::parser;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// How a song file should be rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    /// Write one file per track instead of one mixed file.
    pub split: bool,
    /// Render only this pattern, once.
    pub pattern: Option<String>,
    /// Directory sound paths are relative to. Defaults to the song file's.
    pub base_path: Option<PathBuf>,
    /// Longest pattern chunk the optimizer produces.
    pub chunk_steps: usize,
    /// Run the optimizer before rendering.
    pub optimize: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            split: false,
            pattern: None,
            base_path: None,
            chunk_steps: DEFAULT_CHUNK_STEPS,
            optimize: true,
        }
    }
}

/// One WAV file written by [`render_file`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    pub path: PathBuf,
    /// Track key, for split renders.
    pub track: Option<String>,
    pub summary: RenderSummary,
}

/// Returns the input path with a `.wav` extension.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("wav")
}

/// Returns `<stem>-<track>.wav` next to `output`.
///
/// Track keys that are sound paths lose their directories and `.wav`
/// extension so the result is a plain file name.
pub fn split_output_path(output: &Path, track: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let track = track.strip_suffix(".wav").unwrap_or(track);
    let track: String = track
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    output.with_file_name(format!("{}-{}.wav", stem, track))
}

/// Parses `input` and renders it to `output` as `options` describe.
///
/// With `split` set, `output` only supplies the directory and stem of the
/// per-track files.
pub fn render_file(
    input: &Path,
    output: &Path,
    options: &RenderOptions,
) -> Result<Vec<RenderedFile>> {
    let (song, kit) = parser::parse_file(input, options.base_path.as_deref())?;
    let song = match &options.pattern {
        Some(name) => song.with_single_pattern(name)?,
        None => song,
    };

    if options.split {
        song.split()
            .into_iter()
            .map(|(track, track_song)| {
                let path = split_output_path(output, &track);
                let summary = render_song(&track_song, &kit, &path, options)?;
                Ok(RenderedFile {
                    path,
                    track: Some(track),
                    summary,
                })
            })
            .collect()
    } else {
        let summary = render_song(&song, &kit, output, options)?;
        Ok(vec![RenderedFile {
            path: output.to_path_buf(),
            track: None,
            summary,
        }])
    }
}

/// Renders one song to a WAV file, optimizing it first if asked to.
pub fn render_song(
    song: &Song,
    kit: &Kit,
    output: &Path,
    options: &RenderOptions,
) -> Result<RenderSummary> {
    let song = if options.optimize {
        Cow::Owned(optimize(song, options.chunk_steps)?)
    } else {
        Cow::Borrowed(song)
    };
    let channels = u16::try_from(kit.num_channels()).map_err(|_| {
        DrumrollError::InvalidArgument(format!("{} channels is too many", kit.num_channels()))
    })?;

    let engine = AudioEngine::new(&song, kit)?;
    info!(
        path = ?output,
        channels,
        bits = kit.bits_per_sample(),
        steps = song.flow_step_count(),
        "Writing WAV"
    );
    let mut sink = WavSink::create(output, channels, kit.bits_per_sample(), SAMPLE_RATE)?;
    let summary = engine.render(&mut sink)?;
    sink.finalize()?;
    Ok(summary)
}

//! Song file parsing.
//!
//! A song file is a YAML document with one `Song` section (tempo, kit and
//! flow) and one section per pattern. Parsing produces a [`Song`] ready for
//! the engine plus the [`Kit`] holding every sound it names.
//!
//! ```yaml
//! Song:
//!   Tempo: 120
//!   Kit:
//!     - bass: sounds/bass.wav
//!   Flow:
//!     - Verse: x2
//! Verse:
//!   - bass: X...X...X...X...
//!   - sounds/hh.wav: X.X.X.X.X.X.X.X.
//! ```

mod document;

use crate::audio::{Kit, KitBuilder};
use crate::error::{DrumrollError, Result};
use crate::model::{Pattern, Song};
use document::{lowercase_keys, single_entry, SongHeader};
use serde_yml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the section holding tempo, kit and flow. Matched case-insensitively.
const SONG_SECTION: &str = "song";

/// Parses song files, resolving sound paths against a base directory.
#[derive(Debug, Clone)]
pub struct SongParser {
    base_path: PathBuf,
}

impl SongParser {
    /// Creates a parser that resolves relative sound paths against `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Reads and parses a song file, loading every sound it uses.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<(Song, Kit)> {
        let path = path.as_ref();
        info!(path = ?path, "Reading song file");
        let yaml = std::fs::read_to_string(path)?;
        self.parse(&yaml)
    }

    /// Parses a song document and loads every sound it uses.
    pub fn parse(&self, yaml: &str) -> Result<(Song, Kit)> {
        let (song, kit) = self.parse_document(yaml)?;
        Ok((song, kit.build()?))
    }

    /// Parses a song document without touching the file system.
    ///
    /// Returns the song and a builder with every sound registered but not
    /// yet loaded.
    ///
    /// # Errors
    ///
    /// Returns `Parse` for structural problems (with the section and track
    /// where they were found), `InvalidTempo`, `InvalidRhythm`, or
    /// `UnknownPattern` if the flow names a pattern the file does not define.
    pub fn parse_document(&self, yaml: &str) -> Result<(Song, KitBuilder)> {
        let document: Value = serde_yml::from_str(yaml)?;
        let sections = document
            .as_mapping()
            .ok_or_else(|| DrumrollError::parse("song file", "expected a mapping of sections"))?;

        let mut header = None;
        let mut pattern_sections = Vec::new();
        for (key, value) in sections {
            let name = key
                .as_str()
                .ok_or_else(|| DrumrollError::parse("song file", "section names must be text"))?;
            if name.eq_ignore_ascii_case(SONG_SECTION) {
                header = Some(read_header(value)?);
            } else {
                pattern_sections.push((name, value));
            }
        }
        let header =
            header.ok_or_else(|| DrumrollError::parse("song file", "missing `Song` section"))?;

        let mut song = Song::new(header.tempo)?;
        let mut kit = KitBuilder::new(&self.base_path);
        for entry in &header.kit {
            let mut items = entry.iter();
            match (items.next(), items.next()) {
                (Some((label, path)), None) => kit.add(label.as_str(), path),
                _ => {
                    return Err(DrumrollError::parse(
                        "kit",
                        "each kit entry must be a single `label: path` pair",
                    ))
                }
            }
        }

        for (name, value) in pattern_sections {
            let pattern = read_pattern(name, value, &mut kit)?;
            debug!(
                pattern = %pattern.name,
                tracks = pattern.track_count(),
                steps = pattern.step_count(),
                "Parsed pattern"
            );
            song.add_pattern(pattern);
        }

        for entry in &header.flow {
            let (name, repeat) = entry.resolve()?;
            song.push_flow(name, repeat);
        }
        song.validate_flow()?;
        for pattern in song.patterns() {
            if !song.flow().contains(&pattern.name) {
                warn!(pattern = %pattern.name, "Pattern is never played");
            }
        }

        info!(
            tempo = song.tempo(),
            patterns = song.pattern_count(),
            flow = song.flow().len(),
            "Parsed song"
        );
        Ok((song, kit))
    }
}

/// Parses a song file, using the file's directory as the base path unless
/// one is given.
pub fn parse_file(path: impl AsRef<Path>, base_path: Option<&Path>) -> Result<(Song, Kit)> {
    let path = path.as_ref();
    let base = match base_path {
        Some(base) => base.to_path_buf(),
        None => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    SongParser::new(base).parse_file(path)
}

fn read_header(value: &Value) -> Result<SongHeader> {
    let mapping = value
        .as_mapping()
        .ok_or_else(|| DrumrollError::parse("Song", "expected tempo, kit and flow settings"))?;
    serde_yml::from_value(Value::Mapping(lowercase_keys(mapping)))
        .map_err(|e| DrumrollError::parse("Song", e.to_string()))
}

/// Builds one pattern, registering any sound paths it uses directly.
fn read_pattern(name: &str, value: &Value, kit: &mut KitBuilder) -> Result<Pattern> {
    let mut pattern = Pattern::new(name);
    let items = match value {
        Value::Null => return Ok(pattern),
        Value::Sequence(items) => items,
        _ => {
            return Err(DrumrollError::parse(
                format!("pattern {:?}", name),
                "expected a list of `sound: rhythm` tracks",
            ))
        }
    };

    for (index, item) in items.iter().enumerate() {
        let context = format!("pattern {:?}, track {}", name, index + 1);
        let (sound, rhythm) = single_entry(item, &context)?;
        let rhythm = rhythm
            .as_str()
            .ok_or_else(|| DrumrollError::parse(&context, "rhythm must be text"))?;
        if !kit.contains(sound) {
            // Not a kit label, so it must be a path to a sound file
            kit.add(sound, sound);
        }
        pattern.add_track(sound, rhythm)?;
    }
    Ok(pattern)
}

//! Song container: tempo, patterns and the order they play in.

use super::pattern::Pattern;
use super::track::Track;
use crate::error::{DrumrollError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// A complete arrangement.
///
/// The flow lists pattern names in playback order, with repeats already
/// expanded. Patterns that never appear in the flow are kept but not played.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    /// Tempo in beats per minute. Always positive.
    tempo: f64,

    /// Patterns by name.
    patterns: BTreeMap<String, Pattern>,

    /// Pattern names in playback order.
    flow: Vec<String>,

    /// Lower bound for the mix-down divisor.
    ///
    /// Zero for songs built from a song file. Optimized songs carry the
    /// track count of the song they were built from so that chunking does not
    /// change the output level.
    mixdown_floor: usize,
}

impl Song {
    /// Creates an empty song.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTempo` unless `tempo` is a finite positive number.
    pub fn new(tempo: f64) -> Result<Self> {
        check_tempo(tempo)?;
        Ok(Self {
            tempo,
            patterns: BTreeMap::new(),
            flow: Vec::new(),
            mixdown_floor: 0,
        })
    }

    /// Creates an empty song that shares this song's tempo and song-level
    /// settings.
    pub fn copy_settings(&self) -> Self {
        Self {
            tempo: self.tempo,
            patterns: BTreeMap::new(),
            flow: Vec::new(),
            mixdown_floor: self.mixdown_floor,
        }
    }

    /// Returns the tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Adds a pattern, replacing any pattern with the same name.
    pub fn add_pattern(&mut self, pattern: Pattern) {
        self.patterns.insert(pattern.name.clone(), pattern);
    }

    /// Returns the pattern called `name`.
    pub fn pattern(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// Iterates over patterns in name order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    /// Returns the number of patterns.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns the flow.
    pub fn flow(&self) -> &[String] {
        &self.flow
    }

    /// Appends a pattern to the flow `repeat` times.
    pub fn push_flow(&mut self, name: impl Into<String>, repeat: usize) {
        let name = name.into();
        self.flow.extend(std::iter::repeat(name).take(repeat));
    }

    /// Replaces the whole flow.
    pub fn set_flow(&mut self, flow: Vec<String>) {
        self.flow = flow;
    }

    /// Returns the mix-down divisor: the largest track count of any pattern,
    /// or the song's mix-down floor if that is larger.
    pub fn total_tracks(&self) -> usize {
        self.patterns
            .values()
            .map(Pattern::track_count)
            .max()
            .unwrap_or(0)
            .max(self.mixdown_floor)
    }

    pub(crate) fn set_mixdown_floor(&mut self, floor: usize) {
        self.mixdown_floor = floor;
    }

    /// Checks that every flow entry names an existing pattern.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPattern` with the first missing name.
    pub fn validate_flow(&self) -> Result<()> {
        match self.flow.iter().find(|name| !self.patterns.contains_key(*name)) {
            Some(missing) => Err(DrumrollError::UnknownPattern(missing.clone())),
            None => Ok(()),
        }
    }

    /// Returns every track key used by any pattern.
    pub fn track_keys(&self) -> BTreeSet<String> {
        self.patterns
            .values()
            .flat_map(|pattern| pattern.tracks().map(|(key, _)| key.to_string()))
            .collect()
    }

    /// Returns the number of steps the flow plays, ignoring overflow.
    pub fn flow_step_count(&self) -> usize {
        self.flow
            .iter()
            .filter_map(|name| self.patterns.get(name))
            .map(Pattern::step_count)
            .sum()
    }

    /// Returns a copy that plays only `name`, once.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPattern` if the song has no such pattern.
    pub fn with_single_pattern(&self, name: &str) -> Result<Song> {
        let pattern = self
            .patterns
            .get(name)
            .ok_or_else(|| DrumrollError::UnknownPattern(name.to_string()))?;
        let mut song = self.copy_settings();
        song.add_pattern(pattern.clone());
        song.push_flow(name, 1);
        Ok(song)
    }

    /// Splits the song into one song per track key.
    ///
    /// Each resulting song has the same flow and pattern lengths as this one,
    /// but every pattern only contains the one track. Patterns that lack the
    /// track get a silent one so their length is unchanged.
    pub fn split(&self) -> BTreeMap<String, Song> {
        self.track_keys()
            .into_iter()
            .map(|key| {
                let mut song = Song {
                    tempo: self.tempo,
                    patterns: BTreeMap::new(),
                    flow: self.flow.clone(),
                    mixdown_floor: 0,
                };
                for pattern in self.patterns.values() {
                    let mut single = Pattern::new(pattern.name.clone());
                    let track = match pattern.track(&key) {
                        Some(track) => track.clone(),
                        None => Track::silent(key.clone(), pattern.step_count()),
                    };
                    single.insert_track(key.clone(), track);
                    song.add_pattern(single);
                }
                (key, song)
            })
            .collect()
    }
}

fn check_tempo(tempo: f64) -> Result<()> {
    if tempo.is_finite() && tempo > 0.0 {
        Ok(())
    } else {
        Err(DrumrollError::InvalidTempo(tempo))
    }
}

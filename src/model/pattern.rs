//! A named group of tracks played together.

use super::track::Track;
use crate::error::Result;
use std::collections::BTreeMap;

/// A pattern is a set of tracks that all share the same length.
///
/// Tracks are stored under a key that starts out as the track's sound label.
/// Adding a second track for the same sound gets a numbered key (`snare2`,
/// `snare3`, ...), so a pattern can hit one sound from several rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Pattern name, unique within a song.
    pub name: String,

    /// Tracks by disambiguated key.
    tracks: BTreeMap<String, Track>,

    /// Common rhythm length of every track.
    step_count: usize,
}

impl Pattern {
    /// Creates an empty pattern.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: BTreeMap::new(),
            step_count: 0,
        }
    }

    /// Adds a track for `sound` with the given rhythm.
    ///
    /// # Returns
    ///
    /// The key the track was stored under.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRhythm` if the rhythm is malformed.
    pub fn add_track(&mut self, sound: &str, rhythm: &str) -> Result<String> {
        let track = Track::new(sound, rhythm)?;
        let key = self.unique_key(sound);
        self.insert_track(key.clone(), track);
        Ok(key)
    }

    /// Stores a track under an exact key, replacing any track already there.
    ///
    /// Used when copying tracks between patterns so that keys (and therefore
    /// overflow routing) survive the copy.
    pub(crate) fn insert_track(&mut self, key: String, mut track: Track) {
        if track.step_count() > self.step_count {
            self.step_count = track.step_count();
            for existing in self.tracks.values_mut() {
                existing.pad_to(self.step_count);
            }
        } else {
            track.pad_to(self.step_count);
        }
        self.tracks.insert(key, track);
    }

    fn unique_key(&self, sound: &str) -> String {
        if !self.tracks.contains_key(sound) {
            return sound.to_string();
        }
        let mut n = 2;
        loop {
            let key = format!("{}{}", sound, n);
            if !self.tracks.contains_key(&key) {
                return key;
            }
            n += 1;
        }
    }

    /// Returns the track stored under `key`.
    pub fn track(&self, key: &str) -> Option<&Track> {
        self.tracks.get(key)
    }

    /// Iterates over `(key, track)` pairs in key order.
    pub fn tracks(&self) -> impl Iterator<Item = (&str, &Track)> {
        self.tracks.iter().map(|(key, track)| (key.as_str(), track))
    }

    /// Returns the number of tracks.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Returns the common length of the pattern's tracks in steps.
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Returns true if the pattern has no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

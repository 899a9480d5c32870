//! A single sound's rhythm within a pattern.

use super::rhythm::{beat_offsets, strip_bars};
use super::REST;
use crate::error::Result;

/// One row of a pattern: the kit sound to play and when to play it.
///
/// The beat-offset sequence is derived from the rhythm and recomputed every
/// time the rhythm changes, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Kit label of the sound this track plays.
    name: String,

    /// Rhythm with bar lines removed.
    rhythm: String,

    /// Cached beat offsets of `rhythm`.
    beats: Vec<usize>,
}

impl Track {
    /// Creates a track, validating the rhythm.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRhythm` if the rhythm contains unknown characters.
    ///
    /// # Examples
    ///
    /// ```
    /// use drumroll::model::Track;
    ///
    /// let track = Track::new("bass", "X...|X...").unwrap();
    /// assert_eq!(track.rhythm(), "X...X...");
    /// assert_eq!(track.beats(), &[0, 4, 4]);
    /// ```
    pub fn new(name: impl Into<String>, rhythm: &str) -> Result<Self> {
        let mut track = Self {
            name: name.into(),
            rhythm: String::new(),
            beats: vec![0],
        };
        track.set_rhythm(rhythm)?;
        Ok(track)
    }

    /// Creates a silent track of the given length.
    pub fn silent(name: impl Into<String>, step_count: usize) -> Self {
        Self {
            name: name.into(),
            rhythm: REST.to_string().repeat(step_count),
            beats: vec![0],
        }
    }

    /// Replaces the rhythm and recomputes the beat offsets.
    pub fn set_rhythm(&mut self, rhythm: &str) -> Result<()> {
        let beats = beat_offsets(rhythm)?;
        self.rhythm = strip_bars(rhythm);
        self.beats = beats;
        Ok(())
    }

    /// Returns the kit label this track plays.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the rhythm without bar lines.
    pub fn rhythm(&self) -> &str {
        &self.rhythm
    }

    /// Returns the beat-offset sequence.
    pub fn beats(&self) -> &[usize] {
        &self.beats
    }

    /// Returns the rhythm length in steps.
    pub fn step_count(&self) -> usize {
        self.rhythm.len()
    }

    /// Returns true if the track never starts its sound.
    pub fn is_silent(&self) -> bool {
        self.beats == [0]
    }

    /// Number of rest steps before the first trigger.
    pub fn intro_steps(&self) -> usize {
        self.beats[0]
    }

    /// Pads the rhythm with trailing rests up to `step_count`.
    ///
    /// Rests never add a trigger, so only the last offset grows.
    pub(crate) fn pad_to(&mut self, step_count: usize) {
        let missing = step_count.saturating_sub(self.step_count());
        if missing == 0 {
            return;
        }
        self.rhythm.push_str(&REST.to_string().repeat(missing));
        if !self.is_silent() {
            if let Some(last) = self.beats.last_mut() {
                *last += missing;
            }
        }
    }

    /// Returns a copy of the steps in `start..end` as a new track.
    pub(crate) fn slice(&self, start: usize, end: usize) -> Result<Self> {
        let end = end.min(self.rhythm.len());
        let start = start.min(end);
        Self::new(self.name.clone(), &self.rhythm[start..end])
    }
}

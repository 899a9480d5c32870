//! Song data structures: tracks, patterns and songs.
//!
//! Rhythms are written one character per step, where a step is a sixteenth
//! note. The model enforces its invariants on construction so the renderer can
//! trust it.

mod pattern;
mod rhythm;
mod song;
mod track;

pub use pattern::Pattern;
pub use rhythm::{beat_offsets, has_trigger, strip_bars};
pub use song::Song;
pub use track::Track;

/// Step character that starts the track's sound.
pub const TRIGGER: char = 'X';

/// Step character where nothing new starts.
pub const REST: char = '.';

/// Bar line. Ignored when a rhythm is assigned.
pub const BAR: char = '|';

/// Steps per beat (quarter note). One step is a sixteenth note.
pub const STEPS_PER_BEAT: usize = 4;

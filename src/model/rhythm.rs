//! Rhythm strings and their beat-offset sequences.
//!
//! A rhythm is a string of steps: `X` starts the sound, `.` is a rest and `|`
//! is a bar line that only exists to make long rhythms readable.

use super::{BAR, REST, TRIGGER};
use crate::error::{DrumrollError, Result};

/// Removes bar lines from a rhythm.
pub fn strip_bars(rhythm: &str) -> String {
    rhythm.chars().filter(|&c| c != BAR).collect()
}

/// Returns true if the rhythm starts its sound at least once.
pub fn has_trigger(rhythm: &str) -> bool {
    rhythm.contains(TRIGGER)
}

/// Converts a rhythm into its beat-offset sequence.
///
/// The first element is the number of rests before the first trigger. Every
/// following element is the length, in steps, of one trigger plus the rests
/// after it. A rhythm without any trigger yields `[0]`.
///
/// # Errors
///
/// Returns [`DrumrollError::InvalidRhythm`] if the rhythm contains anything
/// other than triggers, rests and bar lines.
///
/// # Examples
///
/// ```
/// use drumroll::model::beat_offsets;
///
/// assert_eq!(beat_offsets("X...X.").unwrap(), vec![0, 4, 2]);
/// assert_eq!(beat_offsets("..X.|X...").unwrap(), vec![2, 2, 4]);
/// assert_eq!(beat_offsets("....").unwrap(), vec![0]);
/// ```
pub fn beat_offsets(rhythm: &str) -> Result<Vec<usize>> {
    let mut offsets = Vec::new();
    let mut run = 0usize;

    for c in rhythm.chars() {
        match c {
            TRIGGER => {
                offsets.push(run);
                run = 1;
            }
            REST => run += 1,
            BAR => {}
            found => {
                return Err(DrumrollError::InvalidRhythm {
                    rhythm: rhythm.to_string(),
                    found,
                })
            }
        }
    }

    if offsets.is_empty() {
        return Ok(vec![0]);
    }
    offsets.push(run);
    Ok(offsets)
}

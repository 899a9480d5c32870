//! Song optimizer.
//!
//! Rewrites a song into an equivalent one made of short pattern chunks, with
//! identical chunks collapsed into one. The engine caches per pattern, so
//! smaller and shared patterns mean far fewer buffers to composite and encode
//! for songs that repeat themselves.

use crate::audio::utils::{spans_whole_samples, step_sample_length};
use crate::audio::SAMPLE_RATE;
use crate::error::{DrumrollError, Result};
use crate::model::{has_trigger, Pattern, Song, Track};
use std::collections::HashMap;
use tracing::{debug, info};

/// Chunk length used by the command line unless told otherwise.
pub const DEFAULT_CHUNK_STEPS: usize = 4;

/// Track key used to give an all-rest chunk its length.
pub const PLACEHOLDER_TRACK: &str = "placeholder";

/// Structural identity of a pattern: every `(key, sound, rhythm)` in key
/// order.
type PatternSignature = Vec<(String, String, String)>;

/// Returns an optimized copy of `song`.
///
/// Every pattern is cut into chunks named `<pattern>_<first step>`. A chunk
/// must last a whole number of samples, or the restarted step grid inside it
/// would drift from the original. Chunks are the largest such length up to
/// `max_chunk_steps`, or the shortest one above it when there is none (see
/// [`chunk_steps_for`]). Chunks with the same tracks are merged
/// and the flow is rewritten to play chunks instead of whole patterns.
/// Patterns the new flow never reaches are dropped. The input is not
/// modified.
///
/// # Errors
///
/// Returns `InvalidArgument` if `max_chunk_steps` is zero, or
/// `UnknownPattern` if the flow names a missing pattern.
///
/// # Examples
///
/// ```
/// use drumroll::model::{Pattern, Song};
/// use drumroll::optimizer::optimize;
///
/// let mut song = Song::new(120.0).unwrap();
/// let mut verse = Pattern::new("verse");
/// verse.add_track("bass", "X...X...").unwrap();
/// song.add_pattern(verse);
/// song.push_flow("verse", 2);
///
/// let optimized = optimize(&song, 4).unwrap();
/// assert_eq!(optimized.flow(), &["verse_0"; 4]);
/// assert_eq!(optimized.pattern_count(), 1);
/// ```
pub fn optimize(song: &Song, max_chunk_steps: usize) -> Result<Song> {
    if max_chunk_steps == 0 {
        return Err(DrumrollError::InvalidArgument(
            "chunk length must be at least one step".to_string(),
        ));
    }
    song.validate_flow()?;
    let chunk_steps = chunk_steps_for(song, max_chunk_steps);
    if chunk_steps != max_chunk_steps {
        debug!(max_chunk_steps, chunk_steps, tempo = song.tempo(), "Adjusted chunk length");
    }

    let mut chunk_names: HashMap<&str, Vec<String>> = HashMap::new();
    let mut chunks = Vec::new();
    for pattern in song.patterns() {
        let pieces = split_pattern(pattern, chunk_steps)?;
        chunk_names.insert(
            pattern.name.as_str(),
            pieces.iter().map(|chunk| chunk.name.clone()).collect(),
        );
        chunks.extend(pieces);
    }

    // Collapse identical chunks onto the first one generated
    let mut canonical_by_signature: HashMap<PatternSignature, String> = HashMap::new();
    let mut canonical_name: HashMap<String, String> = HashMap::new();
    let mut retained: HashMap<String, Pattern> = HashMap::new();
    for chunk in chunks {
        let signature = signature(&chunk);
        match canonical_by_signature.get(&signature) {
            Some(existing) => {
                debug!(chunk = %chunk.name, canonical = %existing, "Merging identical chunk");
                canonical_name.insert(chunk.name.clone(), existing.clone());
            }
            None => {
                canonical_by_signature.insert(signature, chunk.name.clone());
                canonical_name.insert(chunk.name.clone(), chunk.name.clone());
                retained.insert(chunk.name.clone(), chunk);
            }
        }
    }

    let mut flow = Vec::new();
    for name in song.flow() {
        for chunk in chunk_names.get(name.as_str()).into_iter().flatten() {
            flow.push(canonical_name[chunk].clone());
        }
    }

    let mut optimized = song.copy_settings();
    optimized.set_mixdown_floor(song.total_tracks());
    for name in &flow {
        if let Some(pattern) = retained.remove(name) {
            optimized.add_pattern(pattern);
        }
    }
    optimized.set_flow(flow);

    info!(
        patterns_before = song.pattern_count(),
        patterns_after = optimized.pattern_count(),
        flow_before = song.flow().len(),
        flow_after = optimized.flow().len(),
        chunk_steps,
        "Optimized song"
    );
    Ok(optimized)
}

/// Returns the chunk length `optimize` uses for `song`.
///
/// Chunk spans must be whole samples long. Those spans are the multiples of
/// the shortest one, so this picks the largest multiple that fits in
/// `max_chunk_steps`, or the shortest span itself if it is longer. If no span
/// up to the longest pattern is whole, patterns are kept in one piece.
pub fn chunk_steps_for(song: &Song, max_chunk_steps: usize) -> usize {
    let step_length = step_sample_length(SAMPLE_RATE, song.tempo());
    let longest = song.patterns().map(Pattern::step_count).max().unwrap_or(0);
    let max_chunk_steps = max_chunk_steps.max(1);
    match (1..=longest).find(|&steps| spans_whole_samples(steps, step_length)) {
        Some(period) if period <= max_chunk_steps => max_chunk_steps / period * period,
        Some(period) => period,
        None => longest.max(max_chunk_steps),
    }
}

/// Cuts one pattern into consecutive chunks of `chunk_steps`; the last one
/// may be shorter.
fn split_pattern(pattern: &Pattern, chunk_steps: usize) -> Result<Vec<Pattern>> {
    let step_count = pattern.step_count();
    (0..step_count)
        .step_by(chunk_steps)
        .map(|start| {
            let end = (start + chunk_steps).min(step_count);
            let mut chunk = Pattern::new(chunk_name(&pattern.name, start));
            for (key, track) in pattern.tracks() {
                if has_trigger(&track.rhythm()[start..end]) {
                    chunk.insert_track(key.to_string(), track.slice(start, end)?);
                }
            }
            if chunk.is_empty() {
                chunk.insert_track(
                    PLACEHOLDER_TRACK.to_string(),
                    Track::silent(PLACEHOLDER_TRACK, end - start),
                );
            }
            Ok(chunk)
        })
        .collect()
}

fn chunk_name(pattern_name: &str, start_step: usize) -> String {
    format!("{}_{}", pattern_name, start_step)
}

fn signature(pattern: &Pattern) -> PatternSignature {
    pattern
        .tracks()
        .map(|(key, track)| {
            (
                key.to_string(),
                track.name().to_string(),
                track.rhythm().to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioEngine, Kit, MemorySink};

    fn pattern(name: &str, tracks: &[(&str, &str)]) -> Pattern {
        let mut pattern = Pattern::new(name);
        for (sound, rhythm) in tracks {
            pattern.add_track(sound, rhythm).unwrap();
        }
        pattern
    }

    fn song(tempo: f64, patterns: Vec<Pattern>, flow: &[&str]) -> Song {
        let mut song = Song::new(tempo).unwrap();
        for pattern in patterns {
            song.add_pattern(pattern);
        }
        for name in flow {
            song.push_flow(*name, 1);
        }
        song
    }

    fn render(song: &Song, kit: &Kit) -> Vec<i32> {
        let mut sink = MemorySink::new();
        AudioEngine::new(song, kit)
            .unwrap()
            .render(&mut sink)
            .unwrap();
        sink.samples
    }

    /// A sound whose samples are all different, so misplaced audio shows up.
    fn ramp(frames: usize, channels: usize, seed: i64) -> Vec<i64> {
        (0..frames * channels)
            .map(|i| ((i as i64 * 37 + seed * 101) % 2001) - 1000)
            .collect()
    }

    fn drum_kit(channels: usize, frames: &[(&str, usize)]) -> Kit {
        let mut kit = Kit::new(channels, 16).unwrap();
        for (seed, (label, length)) in frames.iter().enumerate() {
            kit.add_sound(*label, ramp(*length, channels, seed as i64))
                .unwrap();
        }
        kit
    }

    fn busy_song(tempo: f64) -> Song {
        song(
            tempo,
            vec![
                pattern(
                    "verse",
                    &[
                        ("bass", "X.......X.......|X...X...X.......|"),
                        ("snare", "....X.......X...|....X.......X..X"),
                        ("snare", "..............X.|................"),
                        ("hh", "X.X.X.X.X.X.X.X.|X.X.X.X.X.X.X.X."),
                    ],
                ),
                pattern(
                    "chorus",
                    &[
                        ("bass", "X...X...X...X..."),
                        ("crash", "X..............."),
                        ("hh", "XXXXXXXXXXXXXXXX"),
                    ],
                ),
                pattern("break", &[("snare", "......X."), ("crash", "........")]),
                pattern("fill", &[("tom", "..X..X.X.X")]),
            ],
            &["verse", "chorus", "break", "verse", "fill", "chorus", "chorus", "break"],
        )
    }

    #[test]
    fn test_split_names_and_flow() {
        let original = song(
            120.0,
            vec![pattern("verse", &[("bass", "X...X.X.X.")])],
            &["verse", "verse"],
        );
        let optimized = optimize(&original, 4).unwrap();

        assert_eq!(
            optimized.flow(),
            &["verse_0", "verse_4", "verse_8", "verse_0", "verse_4", "verse_8"]
        );
        assert_eq!(optimized.pattern("verse_4").unwrap().step_count(), 4);
        // The last chunk is short
        let last = optimized.pattern("verse_8").unwrap();
        assert_eq!(last.step_count(), 2);
        assert_eq!(last.track("bass").unwrap().rhythm(), "X.");
    }

    #[test]
    fn test_chunks_only_keep_tracks_that_play() {
        let original = song(
            120.0,
            vec![pattern("verse", &[("bass", "X.......X..."), ("snare", "....X.......")])],
            &["verse"],
        );
        let optimized = optimize(&original, 4).unwrap();

        let first = optimized.pattern("verse_0").unwrap();
        assert_eq!(first.track_count(), 1);
        assert!(first.track("bass").is_some());
        let second = optimized.pattern("verse_4").unwrap();
        assert!(second.track("bass").is_none());
        assert_eq!(second.track("snare").unwrap().rhythm(), "X...");
    }

    #[test]
    fn test_silent_chunk_gets_placeholder() {
        let original = song(
            120.0,
            vec![pattern("intro", &[("bass", "........X..")])],
            &["intro"],
        );
        let optimized = optimize(&original, 4).unwrap();

        // Steps 0-3 and 4-7 are both silent and collapse together
        assert_eq!(optimized.flow(), &["intro_0", "intro_0", "intro_8"]);
        let silent = optimized.pattern("intro_0").unwrap();
        assert_eq!(silent.track_count(), 1);
        let placeholder = silent.track(PLACEHOLDER_TRACK).unwrap();
        assert!(placeholder.is_silent());
        assert_eq!(placeholder.rhythm(), "....");
        assert_eq!(optimized.pattern("intro_8").unwrap().step_count(), 3);
    }

    #[test]
    fn test_identical_chunks_are_canonicalized() {
        let original = song(
            120.0,
            vec![
                pattern("verse", &[("bass", "X...X..."), ("snare", "....")]),
                pattern("chorus", &[("bass", "X...X.X.")]),
            ],
            &["verse", "chorus"],
        );
        let optimized = optimize(&original, 4).unwrap();

        // verse_0, verse_4 and chorus_0 are all just "bass: X..."
        assert_eq!(optimized.pattern_count(), 2);
        assert_eq!(
            optimized.flow(),
            &["chorus_0", "chorus_0", "chorus_0", "chorus_4"]
        );
        assert!(optimized.pattern("verse_0").is_none());
    }

    #[test]
    fn test_duplicate_sound_keys_survive() {
        let original = song(
            120.0,
            vec![pattern("verse", &[("snare", "....X..."), ("snare", "X.......")])],
            &["verse"],
        );
        let optimized = optimize(&original, 4).unwrap();

        // Only the second snare row plays in the first chunk; it keeps its key
        let first = optimized.pattern("verse_0").unwrap();
        let row = first.track("snare2").unwrap();
        assert_eq!(row.name(), "snare");
        assert_eq!(row.rhythm(), "X...");
        assert!(first.track("snare").is_none());
    }

    #[test]
    fn test_song_settings_are_copied() {
        let original = busy_song(97.5);
        let before = original.clone();
        let optimized = optimize(&original, 4).unwrap();

        assert_eq!(original, before);
        assert_eq!(optimized.tempo(), 97.5);
        assert_eq!(optimized.total_tracks(), original.total_tracks());
        assert!(optimized.validate_flow().is_ok());
        assert_eq!(optimized.flow_step_count(), original.flow_step_count());
    }

    #[test]
    fn test_unreferenced_patterns_are_dropped() {
        let original = song(
            120.0,
            vec![pattern("used", &[("bass", "X...")]), pattern("unused", &[("hh", "X.X.")])],
            &["used"],
        );
        let optimized = optimize(&original, 4).unwrap();
        assert_eq!(optimized.pattern_count(), 1);
        assert!(optimized.pattern("unused_0").is_none());
    }

    #[test]
    fn test_invalid_input() {
        let original = busy_song(120.0);
        assert!(matches!(
            optimize(&original, 0),
            Err(DrumrollError::InvalidArgument(_))
        ));

        let mut broken = original.clone();
        broken.push_flow("outro", 1);
        assert!(matches!(
            optimize(&broken, 4),
            Err(DrumrollError::UnknownPattern(_))
        ));
    }

    #[test]
    fn test_chunk_length_spans_whole_samples() {
        let beat = |tempo| {
            let bars = pattern("beat", &[("bass", "X...X...X...X...X...X...X...X...")]);
            song(tempo, vec![bars], &["beat"])
        };

        // 4 samples per step: any length works
        assert_eq!(chunk_steps_for(&beat(SAMPLE_RATE as f64 * 15.0 / 4.0), 3), 3);
        // 120 BPM: whole samples every 2 steps
        assert_eq!(chunk_steps_for(&beat(120.0), 4), 4);
        assert_eq!(chunk_steps_for(&beat(120.0), 3), 2);
        // 130 BPM: whole samples every 13 steps
        assert_eq!(chunk_steps_for(&beat(130.0), 4), 13);
        assert_eq!(chunk_steps_for(&beat(130.0), 30), 26);
        // Nothing whole within the longest pattern: keep patterns whole
        assert_eq!(chunk_steps_for(&beat(131.0), 4), 32);
    }

    #[test]
    fn test_optimized_render_is_identical_at_130_bpm() {
        let kit = drum_kit(1, &[("bass", 100_000)]);
        let beat = pattern("beat", &[("bass", "X...............")]);
        let mut original = song(130.0, vec![beat], &[]);
        original.push_flow("beat", 16);

        let optimized = optimize(&original, DEFAULT_CHUNK_STEPS).unwrap();
        assert_eq!(&optimized.flow()[..2], &["beat_0", "beat_13"]);

        let expected = render(&original, &kit);
        let actual = render(&optimized, &kit);
        assert_eq!(actual.len(), expected.len());
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_optimized_render_is_identical() {
        // 4 samples per step, so every chunk boundary lands on a whole sample
        let tempo = SAMPLE_RATE as f64 * 15.0 / 4.0;
        let kit = drum_kit(
            1,
            &[("bass", 30), ("snare", 9), ("hh", 3), ("crash", 70), ("tom", 13)],
        );
        let original = busy_song(tempo);
        let expected = render(&original, &kit);

        for chunk_steps in [1, 2, 3, 4, 5, 8, 16, 64] {
            let optimized = optimize(&original, chunk_steps).unwrap();
            assert_eq!(
                render(&optimized, &kit),
                expected,
                "chunk length {}",
                chunk_steps
            );
        }
    }

    #[test]
    fn test_optimized_render_is_identical_at_120_bpm() {
        // 5512.5 samples per step; chunks of 2 and 4 steps are whole samples
        let kit = drum_kit(
            2,
            &[("bass", 12000), ("snare", 7000), ("hh", 2000), ("crash", 40000), ("tom", 9000)],
        );
        let original = busy_song(120.0);
        let expected = render(&original, &kit);

        for chunk_steps in [2, 4] {
            let optimized = optimize(&original, chunk_steps).unwrap();
            assert_eq!(render(&optimized, &kit), expected, "chunk length {}", chunk_steps);
        }
    }
}

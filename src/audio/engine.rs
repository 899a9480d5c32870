//! Offline renderer that turns a song into PCM samples.
//!
//! The engine walks the song's flow in order. Each pattern is composited
//! once, then combined with whatever sound spilled over from the previous
//! pattern, mixed down and encoded. Both steps are cached for the lifetime of
//! a single [`AudioEngine::render`] call.

use crate::audio::kit::Kit;
use crate::audio::sink::PcmSink;
use crate::audio::utils::{
    composite, frame_count, mix_into, scale, step_sample_length, step_start_sample,
};
use crate::error::{DrumrollError, Result};
use crate::model::{Pattern, Song, Track};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, info};

/// Sample rate of kits and rendered output (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Sound that runs past the end of a pattern, by track key.
///
/// A `BTreeMap` so that equal maps compare and hash the same way.
type OverflowMap = BTreeMap<String, Vec<i64>>;

/// Stable identity of a pattern within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PatternKey(usize);

/// Sample data produced by one track.
#[derive(Debug, Clone, PartialEq)]
struct TrackSampleData {
    /// Samples that fall inside the track's own length.
    primary: Vec<i64>,
    /// Tail of the last triggered sound that did not fit.
    overflow: Vec<i64>,
}

/// All tracks of a pattern summed together, before overflow and mix-down.
#[derive(Debug)]
struct CompositedPattern {
    primary: Vec<i64>,
    overflow: OverflowMap,
}

/// A pattern ready to be written, for one particular incoming overflow.
#[derive(Debug)]
struct EncodedPattern {
    samples: Vec<i32>,
    frame_count: usize,
    overflow: OverflowMap,
}

/// Caches owned by a single render call.
#[derive(Default)]
struct RenderCache {
    /// Pattern → composited tracks. Shared read-only; merged on a copy.
    composited: HashMap<PatternKey, Rc<CompositedPattern>>,
    /// (pattern, incoming overflow) → encoded output.
    encoded: HashMap<(PatternKey, OverflowMap), EncodedPattern>,
}

/// What a render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    /// Frames written, including the trailing overflow.
    pub frames: usize,
    /// Length of the output in seconds.
    pub duration_secs: f64,
    /// Distinct (pattern, overflow) combinations that had to be encoded.
    pub segments_encoded: usize,
    /// Distinct patterns that had to be composited.
    pub patterns_composited: usize,
}

/// Renders one song with one kit.
///
/// The engine only borrows the song and kit; several engines (for example one
/// per split track) can share the same kit.
pub struct AudioEngine<'a> {
    song: &'a Song,
    kit: &'a Kit,
    /// Samples per step, unrounded.
    step_sample_length: f64,
    /// Pattern name → key, for every pattern in the song.
    keys: HashMap<&'a str, PatternKey>,
    /// Patterns indexed by key.
    patterns: Vec<&'a Pattern>,
}

impl<'a> AudioEngine<'a> {
    /// Creates an engine, checking the song against the kit up front.
    ///
    /// # Errors
    ///
    /// Returns `UnknownPattern` if the flow names a missing pattern, or
    /// `LabelNotFound` if a track that plays anything uses a sound the kit
    /// does not have.
    pub fn new(song: &'a Song, kit: &'a Kit) -> Result<Self> {
        song.validate_flow()?;

        let mut keys = HashMap::new();
        let mut patterns = Vec::with_capacity(song.pattern_count());
        for (index, pattern) in song.patterns().enumerate() {
            for (_, track) in pattern.tracks() {
                if !track.is_silent() && !kit.contains(track.name()) {
                    return Err(DrumrollError::LabelNotFound(track.name().to_string()));
                }
            }
            keys.insert(pattern.name.as_str(), PatternKey(index));
            patterns.push(pattern);
        }

        Ok(Self {
            song,
            kit,
            step_sample_length: step_sample_length(SAMPLE_RATE, song.tempo()),
            keys,
            patterns,
        })
    }

    /// Returns the number of samples per step.
    pub fn step_sample_length(&self) -> f64 {
        self.step_sample_length
    }

    /// Renders the whole flow into `sink`.
    ///
    /// Patterns are written strictly in flow order because each one's
    /// overflow feeds the next. After the flow, whatever overflow is left is
    /// mixed and written as a final segment.
    pub fn render<S: PcmSink>(&self, sink: &mut S) -> Result<RenderSummary> {
        let channels = self.kit.num_channels();
        let mut cache = RenderCache::default();
        let mut incoming = OverflowMap::new();
        let mut frames = 0usize;

        info!(
            tempo = self.song.tempo(),
            flow_len = self.song.flow().len(),
            patterns = self.patterns.len(),
            total_tracks = self.song.total_tracks(),
            "Rendering song"
        );

        for name in self.song.flow() {
            let key = self.key_for(name)?;
            let cache_key = (key, std::mem::take(&mut incoming));
            let encoded = match cache.encoded.entry(cache_key) {
                Entry::Occupied(entry) => {
                    debug!(pattern = %name, "Encoded pattern cache hit");
                    entry.into_mut()
                }
                Entry::Vacant(entry) => {
                    let overflow_in = &entry.key().1;
                    debug!(pattern = %name, overflow_tracks = overflow_in.len(), "Encoding pattern");
                    let encoded = self.encode_pattern(key, overflow_in, &mut cache.composited)?;
                    entry.insert(encoded)
                }
            };

            sink.write_samples(&encoded.samples)?;
            frames += encoded.frame_count;
            incoming = encoded.overflow.clone();
        }

        // Whatever is still ringing after the last pattern
        let leftovers: Vec<&[i64]> = incoming.values().map(Vec::as_slice).collect();
        let tail = composite(&leftovers, channels)?;
        let tail = scale(&tail, channels, self.mixdown_divisor())?;
        let tail = self.encode(&tail);
        sink.write_samples(&tail)?;
        frames += frame_count(&tail, channels);

        let summary = RenderSummary {
            frames,
            duration_secs: frames as f64 / SAMPLE_RATE as f64,
            segments_encoded: cache.encoded.len(),
            patterns_composited: cache.composited.len(),
        };
        info!(
            frames = summary.frames,
            duration_secs = summary.duration_secs,
            segments_encoded = summary.segments_encoded,
            patterns_composited = summary.patterns_composited,
            "Render complete"
        );
        Ok(summary)
    }

    fn key_for(&self, name: &str) -> Result<PatternKey> {
        self.keys
            .get(name)
            .copied()
            .ok_or_else(|| DrumrollError::UnknownPattern(name.to_string()))
    }

    /// The song-wide track count, so patterns with fewer tracks are not
    /// louder than the rest.
    fn mixdown_divisor(&self) -> usize {
        self.song.total_tracks().max(1)
    }

    /// Produces the encoded output of one pattern for one incoming overflow.
    fn encode_pattern(
        &self,
        key: PatternKey,
        incoming: &OverflowMap,
        composited: &mut HashMap<PatternKey, Rc<CompositedPattern>>,
    ) -> Result<EncodedPattern> {
        let pattern = self.patterns[key.0];
        let cached = match composited.entry(key) {
            Entry::Occupied(entry) => Rc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let fresh = Rc::new(self.composite_pattern_tracks(pattern)?);
                Rc::clone(entry.insert(fresh))
            }
        };

        let (primary, overflow) = self.handle_incoming_overflow(
            pattern,
            incoming,
            cached.primary.clone(),
            cached.overflow.clone(),
        );

        let channels = self.kit.num_channels();
        let mixed = scale(&primary, channels, self.mixdown_divisor())?;
        let samples = self.encode(&mixed);
        Ok(EncodedPattern {
            frame_count: frame_count(&samples, channels),
            samples,
            overflow,
        })
    }

    /// Places a track's sound at every trigger.
    ///
    /// Returns `None` for a track that never triggers; the pattern buffer is
    /// already silent, so there is nothing to add.
    fn generate_track_sample_data(&self, track: &Track, sound: &[i64]) -> Option<TrackSampleData> {
        if track.is_silent() {
            return None;
        }

        let channels = self.kit.num_channels();
        let length = self.step_sample_length;
        let track_frames = step_start_sample(track.step_count(), length);
        let sound_frames = sound.len() / channels;
        let mut primary = vec![0i64; track_frames * channels];

        let beats = track.beats();
        let mut step_index = beats[0];
        let mut placed = 0usize;
        for &gap in &beats[1..] {
            let start = step_start_sample(step_index, length);
            let end = (start + sound_frames).min(track_frames);
            placed = end.saturating_sub(start);
            if placed > 0 {
                primary[start * channels..end * channels]
                    .copy_from_slice(&sound[..placed * channels]);
            }
            step_index += gap;
        }

        Some(TrackSampleData {
            primary,
            overflow: sound[placed * channels..].to_vec(),
        })
    }

    /// Sums every track of a pattern into one buffer of the pattern's length.
    fn composite_pattern_tracks(&self, pattern: &Pattern) -> Result<CompositedPattern> {
        let channels = self.kit.num_channels();
        let pattern_frames = step_start_sample(pattern.step_count(), self.step_sample_length);

        let mut primaries = vec![vec![0i64; pattern_frames * channels]];
        let mut overflow = OverflowMap::new();
        for (key, track) in pattern.tracks() {
            if track.is_silent() {
                continue;
            }
            let sound = self.kit.get_sample_data(track.name())?;
            if let Some(data) = self.generate_track_sample_data(track, sound) {
                primaries.push(data.primary);
                if !data.overflow.is_empty() {
                    overflow.insert(key.to_string(), data.overflow);
                }
            }
        }

        debug!(
            pattern = %pattern.name,
            tracks = pattern.track_count(),
            frames = pattern_frames,
            "Composited pattern"
        );
        Ok(CompositedPattern {
            primary: composite(&primaries, channels)?,
            overflow,
        })
    }

    /// Merges the previous pattern's overflow into this pattern's buffer.
    ///
    /// Overflow for a track the pattern still plays stops at that track's
    /// first trigger. Overflow for any other track plays on through the
    /// pattern, and whatever does not fit is passed along to the next one.
    fn handle_incoming_overflow(
        &self,
        pattern: &Pattern,
        incoming: &OverflowMap,
        mut primary: Vec<i64>,
        mut overflow: OverflowMap,
    ) -> (Vec<i64>, OverflowMap) {
        let channels = self.kit.num_channels();
        let room = primary.len();

        for (key, samples) in incoming {
            let end = match pattern.track(key) {
                Some(track) if !track.is_silent() => {
                    let intro = step_start_sample(track.intro_steps(), self.step_sample_length);
                    samples.len().min(intro * channels)
                }
                _ => {
                    if samples.len() > room {
                        overflow.insert(key.clone(), samples[room..].to_vec());
                        room
                    } else {
                        samples.len()
                    }
                }
            };
            mix_into(&mut primary, &samples[..end]);
        }

        (primary, overflow)
    }

    /// Clamps mixed samples to the kit's bit depth.
    fn encode(&self, samples: &[i64]) -> Vec<i32> {
        let bits = u32::from(self.kit.bits_per_sample());
        let max = (1i64 << (bits - 1)) - 1;
        let min = -(1i64 << (bits - 1));
        samples.iter().map(|&s| s.clamp(min, max) as i32).collect()
    }
}

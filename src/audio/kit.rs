//! Sound kits: the sample data each track label plays.
//!
//! Every buffer in a kit has the same channel count and bit depth. Sounds
//! loaded from disk are converted on the way in, so the engine never has to
//! care what format a file was recorded in.

use crate::audio::engine::SAMPLE_RATE;
use crate::error::{DrumrollError, Result};
use hound::{SampleFormat, WavReader};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest channel count a kit can hold.
const MAX_CHANNELS: usize = 2;

/// Bit depth that floating point files are converted to.
const FLOAT_TARGET_BITS: u16 = 16;

/// An immutable set of sounds sharing one format.
#[derive(Debug, Clone, PartialEq)]
pub struct Kit {
    num_channels: usize,
    bits_per_sample: u16,
    sounds: HashMap<String, Vec<i64>>,
}

impl Kit {
    /// Creates an empty kit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a zero channel count or a bit depth
    /// other than 8, 16, 24 or 32.
    pub fn new(num_channels: usize, bits_per_sample: u16) -> Result<Self> {
        if num_channels < 1 {
            return Err(DrumrollError::InvalidArgument(
                "a kit needs at least one channel".to_string(),
            ));
        }
        if ![8, 16, 24, 32].contains(&bits_per_sample) {
            return Err(DrumrollError::InvalidArgument(format!(
                "unsupported bit depth {}",
                bits_per_sample
            )));
        }
        Ok(Self {
            num_channels,
            bits_per_sample,
            sounds: HashMap::new(),
        })
    }

    /// Adds a sound already in the kit's format.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the samples do not form whole frames.
    pub fn add_sound(&mut self, label: impl Into<String>, samples: Vec<i64>) -> Result<()> {
        let label = label.into();
        if samples.len() % self.num_channels != 0 {
            return Err(DrumrollError::InvalidArgument(format!(
                "sound {:?} has {} samples, not a whole number of {}-channel frames",
                label,
                samples.len(),
                self.num_channels
            )));
        }
        self.sounds.insert(label, samples);
        Ok(())
    }

    /// Returns the interleaved samples for `label`.
    ///
    /// # Errors
    ///
    /// Returns `LabelNotFound` if the kit has no such sound.
    pub fn get_sample_data(&self, label: &str) -> Result<&[i64]> {
        self.sounds
            .get(label)
            .map(Vec::as_slice)
            .ok_or_else(|| DrumrollError::LabelNotFound(label.to_string()))
    }

    /// Returns true if the kit has a sound called `label`.
    pub fn contains(&self, label: &str) -> bool {
        self.sounds.contains_key(label)
    }

    /// Returns the channel count shared by every sound.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Returns the bit depth shared by every sound.
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Returns the number of sounds.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    /// Returns true if the kit has no sounds.
    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }
}

/// A sound file read from disk before format conversion.
struct RawSound {
    samples: Vec<i64>,
    channels: usize,
    bits: u16,
}

/// Collects sound files by label and loads them into a [`Kit`].
#[derive(Debug, Clone, Default)]
pub struct KitBuilder {
    base_path: PathBuf,
    entries: BTreeMap<String, PathBuf>,
}

impl KitBuilder {
    /// Creates a builder that resolves relative paths against `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Registers a sound file under `label`, replacing any earlier path.
    pub fn add(&mut self, label: impl Into<String>, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let resolved = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        };
        self.entries.insert(label.into(), resolved);
    }

    /// Returns true if `label` has been registered.
    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Loads every registered file and converts them to a common format.
    ///
    /// The kit uses the largest channel count and bit depth among the files.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, is not 44.1 kHz, or has more
    /// than two channels.
    pub fn build(&self) -> Result<Kit> {
        let mut raw = Vec::with_capacity(self.entries.len());
        for (label, path) in &self.entries {
            info!(label = %label, path = ?path, "Loading sound");
            raw.push((label, load_wav(path)?));
        }

        let channels = raw.iter().map(|(_, s)| s.channels).max().unwrap_or(1);
        let bits = raw
            .iter()
            .map(|(_, s)| s.bits)
            .max()
            .unwrap_or(FLOAT_TARGET_BITS);

        let mut kit = Kit::new(channels, bits)?;
        for (label, sound) in raw {
            kit.add_sound(label.clone(), convert(sound, channels, bits))?;
        }
        debug!(
            sounds = kit.len(),
            channels = kit.num_channels(),
            bits = kit.bits_per_sample(),
            "Kit ready"
        );
        Ok(kit)
    }
}

fn load_wav(path: &Path) -> Result<RawSound> {
    let unsupported = |message: String| DrumrollError::UnsupportedFormat {
        path: path.display().to_string(),
        message,
    };

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != SAMPLE_RATE {
        return Err(unsupported(format!(
            "sample rate is {} Hz, expected {} Hz",
            spec.sample_rate, SAMPLE_RATE
        )));
    }
    let channels = spec.channels as usize;
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(unsupported(format!("{} channels is not supported", channels)));
    }

    let (samples, bits) = match spec.sample_format {
        SampleFormat::Int => {
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(i64::from))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (samples, spec.bits_per_sample)
        }
        SampleFormat::Float => {
            let max = ((1i64 << (FLOAT_TARGET_BITS - 1)) - 1) as f32;
            let samples = reader
                .samples::<f32>()
                .map(|s| s.map(|x| (x.clamp(-1.0, 1.0) * max).round() as i64))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            (samples, FLOAT_TARGET_BITS)
        }
    };

    Ok(RawSound {
        samples,
        channels,
        bits,
    })
}

/// Converts a sound to `channels` and `bits`. Only ever widens.
fn convert(sound: RawSound, channels: usize, bits: u16) -> Vec<i64> {
    let shift = bits.saturating_sub(sound.bits);
    let widen = |s: i64| s << shift;

    if sound.channels == channels {
        sound.samples.into_iter().map(widen).collect()
    } else {
        // Mono into a wider kit: copy the one channel everywhere
        sound
            .samples
            .iter()
            .flat_map(|&s| std::iter::repeat(widen(s)).take(channels))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, bits: u16, sample_rate: u32, samples: &[i32]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_kit_lookup() {
        let mut kit = Kit::new(1, 16).unwrap();
        kit.add_sound("bass", vec![1, 2, 3]).unwrap();
        assert_eq!(kit.get_sample_data("bass").unwrap(), &[1, 2, 3]);
        assert!(matches!(
            kit.get_sample_data("snare"),
            Err(DrumrollError::LabelNotFound(_))
        ));
    }

    #[test]
    fn test_kit_rejects_partial_frames() {
        let mut kit = Kit::new(2, 16).unwrap();
        assert!(kit.add_sound("bass", vec![1, 2, 3]).is_err());
        assert!(Kit::new(0, 16).is_err());
        assert!(Kit::new(1, 12).is_err());
    }

    #[test]
    fn test_build_converts_to_common_format() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("mono8.wav"), 1, 8, SAMPLE_RATE, &[1, -2]);
        write_wav(&dir.path().join("stereo16.wav"), 2, 16, SAMPLE_RATE, &[100, -100]);

        let mut builder = KitBuilder::new(dir.path());
        builder.add("click", "mono8.wav");
        builder.add("pad", "stereo16.wav");
        let kit = builder.build().unwrap();

        assert_eq!(kit.num_channels(), 2);
        assert_eq!(kit.bits_per_sample(), 16);
        assert_eq!(kit.get_sample_data("pad").unwrap(), &[100, -100]);
        // 8-bit mono: widened by 8 bits and copied to both channels
        assert_eq!(kit.get_sample_data("click").unwrap(), &[256, 256, -512, -512]);
    }

    #[test]
    fn test_build_rejects_other_sample_rates() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("slow.wav"), 1, 16, 22050, &[0, 0]);

        let mut builder = KitBuilder::new(dir.path());
        builder.add("slow", "slow.wav");
        assert!(matches!(
            builder.build(),
            Err(DrumrollError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_build_missing_file() {
        let mut builder = KitBuilder::new("/nonexistent");
        builder.add("ghost", "ghost.wav");
        assert!(builder.build().is_err());
    }
}

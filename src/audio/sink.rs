//! Destinations for rendered PCM data.

use crate::error::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Something that accepts encoded, interleaved PCM samples in order.
pub trait PcmSink {
    /// Appends samples to the output.
    fn write_samples(&mut self, samples: &[i32]) -> Result<()>;
}

/// Writes PCM data to a WAV file.
///
/// The header is patched with the final length when the sink is finalized.
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
}

impl WavSink {
    /// Creates the output file and writes a provisional header.
    ///
    /// # Arguments
    ///
    /// * `path` - Path for the output WAV file
    /// * `channels` - Channels per frame
    /// * `bits_per_sample` - 8, 16, 24 or 32
    /// * `sample_rate` - Frames per second
    pub fn create<P: AsRef<Path>>(
        path: P,
        channels: u16,
        bits_per_sample: u16,
        sample_rate: u32,
    ) -> Result<Self> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        Ok(Self { writer })
    }

    /// Flushes all data and fixes up the header.
    pub fn finalize(self) -> Result<()> {
        self.writer.finalize()?;
        Ok(())
    }
}

impl PcmSink for WavSink {
    fn write_samples(&mut self, samples: &[i32]) -> Result<()> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        Ok(())
    }
}

/// Keeps rendered samples in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    /// Every sample written so far, interleaved.
    pub samples: Vec<i32>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl PcmSink for MemorySink {
    fn write_samples(&mut self, samples: &[i32]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn test_memory_sink_appends() {
        let mut sink = MemorySink::new();
        sink.write_samples(&[1, 2]).unwrap();
        sink.write_samples(&[]).unwrap();
        sink.write_samples(&[3]).unwrap();
        assert_eq!(sink.samples, vec![1, 2, 3]);
    }

    #[test]
    fn test_wav_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");

        let mut sink = WavSink::create(&path, 2, 16, 44100).unwrap();
        sink.write_samples(&[1, -1, 32767, -32768]).unwrap();
        sink.finalize().unwrap();

        let mut reader = WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 2);
        let samples: Vec<i32> = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -1, 32767, -32768]);
    }
}

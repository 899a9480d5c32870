//! Audio rendering for drum songs.
//!
//! This module turns a [`Song`](crate::model::Song) and a [`Kit`] into PCM
//! data. It provides:
//! - Sample buffer arithmetic (mixing, scaling, step timing)
//! - Sound kits loaded from WAV files
//! - The offline rendering engine with its pattern caches
//! - Output sinks for WAV files and memory

pub mod engine;
pub mod kit;
pub mod sink;
pub mod utils;

pub use engine::{AudioEngine, RenderSummary, SAMPLE_RATE};
pub use kit::{Kit, KitBuilder};
pub use sink::{MemorySink, PcmSink, WavSink};

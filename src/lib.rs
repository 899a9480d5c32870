//! drumroll - A step-sequenced drum song renderer.
//!
//! This library parses drum songs written as trigger/rest rhythms, optionally
//! rewrites them into smaller deduplicated patterns, and renders them to PCM
//! with a sample kit.

pub mod audio;
pub mod error;
pub mod model;
pub mod optimizer;
pub mod parser;
pub mod render;

// Re-export commonly used types
pub use audio::{AudioEngine, Kit, KitBuilder, MemorySink, PcmSink, RenderSummary, WavSink};
pub use error::{DrumrollError, Result};
pub use model::{Pattern, Song, Track};
pub use optimizer::optimize;
pub use parser::SongParser;
pub use render::{render_file, RenderOptions, RenderedFile};

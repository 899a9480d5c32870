//! Error type shared by the model, optimizer, engine and parser.
//!
//! Every variant is a "fail the whole render" condition. Nothing in the
//! rendering path retries or produces partial output.

/// Errors that can occur while building, optimizing or rendering a song.
#[derive(Debug, thiserror::Error)]
pub enum DrumrollError {
    /// A rhythm contains a character other than a trigger, rest or bar.
    #[error("Invalid rhythm {rhythm:?}: unexpected character {found:?}")]
    InvalidRhythm { rhythm: String, found: char },

    /// Tempo is zero, negative or not a number.
    #[error("Invalid tempo {0}: tempo must be a positive number")]
    InvalidTempo(f64),

    /// A track references a sound that is not in the kit.
    #[error("Sound {0:?} not found in kit")]
    LabelNotFound(String),

    /// A sample utility or the optimizer was called with a bad argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The flow (or a single-pattern request) names a missing pattern.
    #[error("Unknown pattern {0:?}")]
    UnknownPattern(String),

    /// The song file is structurally invalid.
    #[error("Song file error in {context}: {message}")]
    Parse { context: String, message: String },

    /// A sound file is in a format the kit cannot hold.
    #[error("Unsupported sound format in {path}: {message}")]
    UnsupportedFormat { path: String, message: String },

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),
}

impl DrumrollError {
    /// Shorthand for a [`DrumrollError::Parse`] with context.
    pub(crate) fn parse(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DrumrollError>;

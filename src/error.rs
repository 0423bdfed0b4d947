use thiserror::Error;

/// A persisted or command-line configuration value is out of range.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("total sums must be greater than zero")]
    NoSums,
    #[error("questions each sum must be greater than zero")]
    NoQuestions,
    #[error("digits must be between 1 and {max}, got {got}")]
    Digits { got: u32, max: u32 },
    #[error("negative percentage must be within 0..=1, got {0}")]
    NegativePercentage(f64),
    #[error("playback rate must be a finite number greater than zero, got {0}")]
    PlaybackRate(f32),
    #[error("{questions} numbers of {digits} digits can add up past the largest supported total")]
    RowTooWide { digits: u32, questions: usize },
}

/// Question generation gave up under an explicit draw cap.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("row {row} could not be filled after {draws} draws; the configuration leaves too few valid numbers")]
    Exhausted { row: usize, draws: u64 },
}

/// Errors from the key-value store holding config and session history.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Errors raised by an audio device while starting a clip.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AudioError {
    #[error("no audio output available: {0}")]
    Output(String),
    #[error("could not decode clip {path}: {reason}")]
    Decode { path: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//! Error types for speechdesk

use thiserror::Error;

/// Result type alias for speechdesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in speechdesk
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A required user input was empty; the message is shown to the user as-is
    #[error("{0}")]
    MissingInput(String),

    /// A recognition session is already open
    #[error("a recognition session is already active")]
    SessionActive,

    /// Speech recognition error
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Chat-completion translation error
    #[error("translation error: {0}")]
    Translation(String),

    /// Voice catalog error
    #[error("voice catalog error: {0}")]
    Catalog(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether this error should be shown to the user as a blocking alert
    #[must_use]
    pub const fn is_alert(&self) -> bool {
        matches!(self, Self::MissingInput(_) | Self::SessionActive)
    }
}

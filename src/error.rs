//! Error types for Kagami

use thiserror::Error;

/// Main error type for Kagami
#[derive(Error, Debug)]
pub enum KagamiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackerError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Tracker-related errors (receiver + subprocess)
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Tracker receiver error: {0}")]
    Receiver(String),

    #[error("Tracker parse error: {0}")]
    Parse(String),

    #[error("Tracker subprocess error: {0}")]
    Subprocess(String),
}

/// Avatar-related errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Invalid avatar descriptor: {0}")]
    Descriptor(String),
}

/// Result type alias for Kagami operations
pub type Result<T> = std::result::Result<T, KagamiError>;

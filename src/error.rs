use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
    #[error("Slack error: {0}")]
    SlackError(String),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

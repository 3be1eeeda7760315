use thiserror::Error;

#[derive(Debug, Error)]
pub enum LiveboardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LiveboardError {
    /// Short error code string sent to clients in structured error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LiveboardError::Config(_) => "CONFIG_ERROR",
            LiveboardError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Detail without the category prefix.
    pub fn detail(&self) -> &str {
        match self {
            LiveboardError::Config(msg) | LiveboardError::InvalidRequest(msg) => msg,
        }
    }
}

pub type Result<T> = std::result::Result<T, LiveboardError>;

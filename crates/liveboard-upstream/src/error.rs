use thiserror::Error;

/// Generic user-facing text when a failure has no known category.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown connection error";

/// Failures reported by (or while reaching) the live-session source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// The broadcast is over.
    #[error("LIVE has ended: {0}")]
    StreamEnded(String),

    /// No such user, or the user has no room.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// The user exists but is not broadcasting.
    #[error("user offline: {0}")]
    UserOffline(String),

    /// Anything upstream reported that matches no known category.
    #[error("{0}")]
    Other(String),

    /// The relay could not be reached or the byte stream broke.
    #[error("relay transport error: {0}")]
    Transport(String),

    /// Live mode is not usable with the current configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl UpstreamError {
    /// Categorise a raw upstream error message.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw.contains("LIVE has ended") {
            UpstreamError::StreamEnded(raw)
        } else if raw.contains("not found") {
            UpstreamError::UserNotFound(raw)
        } else if raw.contains("offline") {
            UpstreamError::UserOffline(raw)
        } else {
            UpstreamError::Other(raw)
        }
    }

    /// Human-readable text for end users.
    ///
    /// Known categories get a fixed message; unmatched upstream messages pass
    /// through; our own transport and config failures never leak details.
    pub fn user_message(&self) -> String {
        match self {
            UpstreamError::StreamEnded(_) => "The stream has ended".to_string(),
            UpstreamError::UserNotFound(_) => "User not found or not streaming".to_string(),
            UpstreamError::UserOffline(_) => "User is not live right now".to_string(),
            UpstreamError::Other(raw) if !raw.trim().is_empty() => raw.clone(),
            UpstreamError::Other(_) | UpstreamError::Transport(_) | UpstreamError::Config(_) => {
                UNKNOWN_ERROR_MESSAGE.to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, UpstreamError>;

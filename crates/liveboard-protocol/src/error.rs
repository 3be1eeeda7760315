use thiserror::Error;

/// A push message that could not be turned into a normalized event.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, or a known `type` whose fields do not fit.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The `type` discriminator is missing or not one we understand.
    #[error("unknown frame type: {0}")]
    UnknownType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

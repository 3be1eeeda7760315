use thiserror::Error;

/// Failures on the subscriber side of the push stream.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The push connection could not be opened or dropped mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The gateway answered the subscribe request with a non-2xx status.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The reconnect task has exited.
    #[error("controller stopped")]
    Stopped,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

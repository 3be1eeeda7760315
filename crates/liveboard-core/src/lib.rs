pub mod config;
pub mod error;
pub mod types;

pub use error::{LiveboardError, Result};
pub use types::{DonorEntry, LikerEntry, NormalizedEvent, SessionId, StreamMode, User};

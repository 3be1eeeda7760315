pub mod aggregate;
pub mod error;
pub mod reconnect;
pub mod transport;

pub use aggregate::{Leaderboard, LeaderboardSnapshot, LeadingGift, LeadingGiftView, StreamStats};
pub use error::ClientError;
pub use reconnect::{ClientView, ConnectionStatus, ReconnectController};
pub use transport::{FrameStream, SseTransport, StreamTarget, Transport};

pub mod client;
pub mod error;
pub mod manager;
pub mod relay;
pub mod sink;
pub mod synthetic;

pub use client::{LiveClient, LiveClientFactory, UpstreamHandler};
pub use error::UpstreamError;
pub use manager::ConnectionManager;
pub use relay::RelayClientFactory;
pub use sink::{ChannelSink, EventSink};
pub use synthetic::SyntheticGenerator;

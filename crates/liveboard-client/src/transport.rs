//! Push-stream transports: open a subscription, yield raw frame payloads.

use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};
use liveboard_core::StreamMode;
use liveboard_protocol::SseDecoder;
use reqwest::header::ACCEPT;
use serde::Serialize;
use tracing::debug;

use crate::error::{ClientError, Result};

/// What a client subscribes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamTarget {
    pub handle: String,
    pub mode: StreamMode,
}

impl StreamTarget {
    pub fn new(handle: impl Into<String>, mode: StreamMode) -> Self {
        Self {
            handle: handle.into(),
            mode,
        }
    }
}

/// Data payloads of one open subscription, in arrival order.
///
/// The stream ends when the server closes it; an `Err` item means the
/// connection broke and no more items follow.
pub type FrameStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(&self, target: &StreamTarget) -> Result<FrameStream>;
}

/// Subscribes to `GET {server_url}/stream` over HTTP server-sent events.
#[derive(Clone)]
pub struct SseTransport {
    http: reqwest::Client,
    server_url: String,
}

impl SseTransport {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            server_url: server_url.into(),
        }
    }

    pub fn stream_url(&self) -> String {
        format!("{}/stream", self.server_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self, target: &StreamTarget) -> Result<FrameStream> {
        let resp = self
            .http
            .get(self.stream_url())
            .header(ACCEPT, "text/event-stream")
            .query(&[("handle", target.handle.as_str()), ("mode", target.mode.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(handle = %target.handle, mode = %target.mode, "push stream opened");
        let mut body = resp.bytes_stream();
        let frames = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for payload in decoder.push(&bytes) {
                            yield Ok(payload);
                        }
                    }
                    Err(e) => {
                        yield Err(ClientError::from(e));
                        break;
                    }
                }
            }
        };
        Ok(frames.boxed())
    }
}

//! Live client backed by an HTTP webcast relay.
//!
//! The relay runs the vendor live library and re-publishes each callback as
//! one JSON line: `GET {relay_url}/webcast/{handle}` streams
//! `{"event":"like",...}\n{"event":"gift",...}\n` until the room closes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use liveboard_core::config::UpstreamConfig;
use tokio_util::{
    codec::{FramedRead, LinesCodec},
    io::StreamReader,
    sync::CancellationToken,
};
use tracing::{debug, info, warn};

use crate::{
    client::{LiveClient, LiveClientFactory, RawMessage, UpstreamHandler},
    error::UpstreamError,
};

/// Upper bound for one relay line; anything longer is a broken relay.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Creates one [`RelayClient`] per connect, sharing the HTTP pool.
pub struct RelayClientFactory {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl RelayClientFactory {
    pub fn new(config: UpstreamConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl LiveClientFactory for RelayClientFactory {
    fn create(&self, handle: &str) -> Result<Arc<dyn LiveClient>, UpstreamError> {
        let base = self
            .config
            .relay_url
            .as_deref()
            .ok_or_else(|| UpstreamError::Config("upstream.relay_url is not set".to_string()))?;
        let url = webcast_url(base, handle)?;
        Ok(Arc::new(RelayClient {
            http: self.http.clone(),
            url,
            query: connect_query(&self.config),
            handler: Mutex::new(None),
            cancel: CancellationToken::new(),
        }))
    }
}

pub struct RelayClient {
    http: reqwest::Client,
    url: reqwest::Url,
    query: Vec<(&'static str, String)>,
    handler: Mutex<Option<Arc<dyn UpstreamHandler>>>,
    cancel: CancellationToken,
}

impl RelayClient {
    fn handler(&self) -> Option<Arc<dyn UpstreamHandler>> {
        self.handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl LiveClient for RelayClient {
    fn register(&self, handler: Arc<dyn UpstreamHandler>) {
        *self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handler);
    }

    async fn connect(&self, handle: &str) -> Result<(), UpstreamError> {
        let handler = self
            .handler()
            .ok_or_else(|| UpstreamError::Config("no handler registered".to_string()))?;

        let request = self.http.get(self.url.clone()).query(&self.query).send();
        let resp = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(UpstreamError::Transport("cancelled".to_string()))
            }
            resp = request => resp.map_err(|e| UpstreamError::Transport(e.to_string()))?,
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let raw = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(UpstreamError::from_raw(raw));
        }

        info!(handle, url = %self.url, "relay stream opened");
        let body = resp.bytes_stream().map_err(std::io::Error::other);
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_LINE_BYTES),
        );
        tokio::spawn(pump(lines, handler, self.cancel.clone(), handle.to_string()));
        Ok(())
    }

    fn disconnect(&self) {
        self.cancel.cancel();
    }
}

/// Read relay lines until the stream ends or the client is disconnected.
async fn pump<S>(
    lines: S,
    handler: Arc<dyn UpstreamHandler>,
    cancel: CancellationToken,
    handle: String,
) where
    S: futures_util::Stream<Item = Result<String, tokio_util::codec::LinesCodecError>>,
{
    tokio::pin!(lines);
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(handle = %handle, "relay pump cancelled");
                return;
            }
            next = lines.next() => next,
        };

        match next {
            Some(Ok(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<RawMessage>(&line) {
                    Ok(msg) => {
                        let terminal = matches!(msg, RawMessage::Disconnected);
                        msg.dispatch(handler.as_ref());
                        if terminal {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(handle = %handle, error = %e, "skipping unparseable relay line")
                    }
                }
            }
            Some(Err(e)) => {
                warn!(handle = %handle, error = %e, "relay stream broke");
                handler.on_error(UpstreamError::Transport(e.to_string()));
                handler.on_disconnected();
                return;
            }
            None => {
                info!(handle = %handle, "relay stream ended");
                handler.on_disconnected();
                return;
            }
        }
    }
}

fn webcast_url(base: &str, handle: &str) -> Result<reqwest::Url, UpstreamError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| UpstreamError::Config(format!("invalid relay_url: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| UpstreamError::Config("relay_url cannot be a base".to_string()))?
        .pop_if_empty()
        .push("webcast")
        .push(handle);
    Ok(url)
}

fn connect_query(config: &UpstreamConfig) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("processInitialData", config.process_initial_data.to_string()),
        (
            "enableExtendedGiftInfo",
            config.enable_extended_gift_info.to_string(),
        ),
        (
            "enableWebsocketUpgrade",
            config.enable_websocket_upgrade.to_string(),
        ),
        (
            "requestPollingIntervalMs",
            config.request_polling_interval_ms.to_string(),
        ),
    ];
    if let Some(session_id) = &config.session_id {
        query.push(("sessionId", session_id.clone()));
    }
    query
}

//! GET /stream: server-sent events for one broadcast session.
//!
//! Query: `handle` (or `username`), optional `mode=live|demo`.
//! Each event is sent as `data: <json>\n\n`; the stream ends after
//! `disconnected` or a failed initial connect.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures_util::Stream;
use liveboard_core::{config::KEEP_ALIVE_SECS, LiveboardError, NormalizedEvent, StreamMode};
use liveboard_protocol::encode_event;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{app::AppState, session::BroadcastSession};

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    pub handle: Option<String>,
    pub username: Option<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StreamError {
    pub error: String,
    pub code: &'static str,
}

impl From<LiveboardError> for StreamError {
    fn from(e: LiveboardError) -> Self {
        Self {
            error: e.detail().to_string(),
            code: e.code(),
        }
    }
}

type Rejection = (StatusCode, Json<StreamError>);

fn bad_request(msg: impl Into<String>) -> Rejection {
    (
        StatusCode::BAD_REQUEST,
        Json(LiveboardError::InvalidRequest(msg.into()).into()),
    )
}

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let (handle, mode) = parse_query(query)?;

    let (session, rx) = BroadcastSession::start(state, &handle, mode);
    let keep_alive = KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(session_events(session, rx)).keep_alive(keep_alive),
    ))
}

fn parse_query(query: StreamQuery) -> Result<(String, StreamMode), Rejection> {
    let handle = query
        .handle
        .or(query.username)
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| bad_request("handle is required"))?;

    let mode = match query.mode.as_deref().map(str::trim) {
        None | Some("") => StreamMode::default(),
        Some(raw) => raw.parse::<StreamMode>().map_err(bad_request)?,
    };
    Ok((handle, mode))
}

/// Drain the session queue into SSE events.
///
/// The session lives inside the stream, so the subscriber going away drops
/// it and tears the producer down.
fn session_events(
    session: BroadcastSession,
    mut rx: mpsc::UnboundedReceiver<NormalizedEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                event = rx.recv() => event,
                _ = session.finished() => rx.try_recv().ok(),
            };
            let Some(event) = next else { break };

            let terminal = event.is_terminal();
            match encode_event(&event) {
                Ok(json) => {
                    debug!(session_id = %session.id(), kind = event.kind(), "event");
                    yield Ok(Event::default().data(json));
                }
                Err(e) => {
                    warn!(session_id = %session.id(), error = %e, "dropping unencodable event")
                }
            }
            if terminal {
                break;
            }
        }
        session.close();
    }
}

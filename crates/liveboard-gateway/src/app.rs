use axum::{routing::get, Router};
use dashmap::DashMap;
use liveboard_core::{config::LiveboardConfig, SessionId};
use liveboard_upstream::LiveClientFactory;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::session::SessionMeta;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: LiveboardConfig,
    /// Builds one upstream client per live session.
    pub live: Arc<dyn LiveClientFactory>,
    /// Open broadcast sessions: session_id -> what it is streaming.
    pub sessions: DashMap<SessionId, SessionMeta>,
}

impl AppState {
    pub fn new(config: LiveboardConfig, live: Arc<dyn LiveClientFactory>) -> Self {
        Self {
            config,
            live,
            sessions: DashMap::new(),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/stream", get(crate::http::stream::stream_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

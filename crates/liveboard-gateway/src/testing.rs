//! In-process upstream double shared by the gateway's unit tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use liveboard_core::config::LiveboardConfig;
use liveboard_upstream::{
    client::{RawLike, RoomInfo},
    LiveClient, LiveClientFactory, UpstreamError, UpstreamHandler,
};

use crate::app::AppState;

#[derive(Clone, Default)]
pub struct MockFactory {
    /// Raw upstream error returned from `connect`.
    pub fail_with: Option<String>,
    /// Emit the terminal callback right after the handshake.
    pub end_after_connect: bool,
    pub disconnects: Arc<AtomicUsize>,
    pub handler: Arc<Mutex<Option<Arc<dyn UpstreamHandler>>>>,
}

impl MockFactory {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(LiveboardConfig::default(), Arc::new(self.clone())))
    }
}

impl LiveClientFactory for MockFactory {
    fn create(&self, _handle: &str) -> Result<Arc<dyn LiveClient>, UpstreamError> {
        Ok(Arc::new(MockClient {
            factory: self.clone(),
        }))
    }
}

struct MockClient {
    factory: MockFactory,
}

#[async_trait]
impl LiveClient for MockClient {
    fn register(&self, handler: Arc<dyn UpstreamHandler>) {
        *self.factory.handler.lock().unwrap() = Some(handler);
    }

    async fn connect(&self, _handle: &str) -> Result<(), UpstreamError> {
        if let Some(raw) = &self.factory.fail_with {
            return Err(UpstreamError::from_raw(raw.clone()));
        }
        let handler = self.factory.handler.lock().unwrap().clone().unwrap();
        handler.on_connected(RoomInfo {
            room_id: "7001".into(),
        });
        handler.on_like(RawLike {
            unique_id: "fan".into(),
            nickname: "Fan".into(),
            profile_picture_url: String::new(),
            like_count: 4,
            total_like_count: 4,
        });
        if self.factory.end_after_connect {
            handler.on_disconnected();
        }
        Ok(())
    }

    fn disconnect(&self) {
        self.factory.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

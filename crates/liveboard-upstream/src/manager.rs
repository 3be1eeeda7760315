use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use tracing::{debug, info, warn};

use crate::{
    client::{
        LiveClient, LiveClientFactory, RawGift, RawLike, RawRoomUser, RoomInfo, UpstreamHandler,
    },
    error::UpstreamError,
    sink::EventSink,
};

/// Name substituted when upstream sends a gift without one.
pub const GIFT_NAME_PLACEHOLDER: &str = "Gift";

/// Human-readable reason attached to the terminal event.
pub const DISCONNECTED_MESSAGE: &str = "Stream ended or connection lost";

/// Owns at most one upstream session and normalizes its callbacks.
///
/// The manager never retries: a failed connect becomes one `Error` event
/// and the session is torn down. Retrying is the subscriber's business.
pub struct ConnectionManager {
    factory: Arc<dyn LiveClientFactory>,
    sink: Arc<dyn EventSink>,
    active: Mutex<Option<ActiveSession>>,
}

struct ActiveSession {
    handle: String,
    client: Arc<dyn LiveClient>,
    translator: Arc<Translator>,
}

impl ActiveSession {
    fn close(self) {
        self.translator.retire();
        self.client.disconnect();
        info!(handle = %self.handle, "upstream session closed");
    }
}

impl ConnectionManager {
    pub fn new(factory: Arc<dyn LiveClientFactory>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            factory,
            sink,
            active: Mutex::new(None),
        }
    }

    /// Open an upstream session for `handle`, replacing any existing one.
    ///
    /// Suspends until the upstream handshake completes. On failure the error
    /// has already been emitted as an `Error` event when this returns.
    pub async fn connect(&self, handle: &str) -> Result<(), UpstreamError> {
        self.disconnect();

        let translator = Arc::new(Translator::new(handle, Arc::clone(&self.sink)));
        let client = match self.factory.create(handle) {
            Ok(c) => c,
            Err(e) => {
                warn!(handle, error = %e, "cannot create upstream client");
                translator.report(&e);
                return Err(e);
            }
        };
        client.register(translator.clone());

        *self.lock() = Some(ActiveSession {
            handle: handle.to_string(),
            client: Arc::clone(&client),
            translator: Arc::clone(&translator),
        });

        info!(handle, "connecting upstream session");
        match client.connect(handle).await {
            Ok(()) => {
                info!(handle, "upstream handshake complete");
                Ok(())
            }
            Err(e) => {
                warn!(handle, error = %e, "upstream connect failed");
                translator.report(&e);
                self.release(&translator);
                Err(e)
            }
        }
    }

    /// Tear down the current upstream session, if any.
    ///
    /// Synchronous: once this returns no further event from that session
    /// reaches the sink.
    pub fn disconnect(&self) {
        let previous = self.lock().take();
        if let Some(session) = previous {
            session.close();
        }
    }

    /// Tear down the active session only while it still belongs to
    /// `translator`; a newer `connect` may already have replaced it.
    fn release(&self, translator: &Arc<Translator>) {
        let mut active = self.lock();
        let ours = active
            .as_ref()
            .is_some_and(|s| Arc::ptr_eq(&s.translator, translator));
        if !ours {
            debug!(handle = %translator.handle, "failed connect was superseded");
            return;
        }
        let session = active.take();
        drop(active);
        if let Some(session) = session {
            session.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Adapter from upstream callbacks to the sink, bound to one session.
struct Translator {
    handle: String,
    sink: Arc<dyn EventSink>,
    live: AtomicBool,
    connected: AtomicBool,
}

impl Translator {
    fn new(handle: &str, sink: Arc<dyn EventSink>) -> Self {
        Self {
            handle: handle.to_string(),
            sink,
            live: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        }
    }

    fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Data events are only valid between `Connected` and `Disconnected`.
    fn accepts_data(&self, kind: &str) -> bool {
        if !self.is_live() {
            return false;
        }
        if !self.connected.load(Ordering::SeqCst) {
            warn!(handle = %self.handle, kind, "dropping event received before connected");
            return false;
        }
        true
    }

    fn report(&self, error: &UpstreamError) {
        if self.is_live() {
            self.sink.error(error.user_message());
        }
    }
}

impl UpstreamHandler for Translator {
    fn on_connected(&self, room: RoomInfo) {
        if !self.is_live() {
            return;
        }
        if self.connected.swap(true, Ordering::SeqCst) {
            debug!(handle = %self.handle, "duplicate connected callback ignored");
            return;
        }
        self.sink.connected(room.room_id, Some(self.handle.clone()));
    }

    fn on_like(&self, like: RawLike) {
        if !self.accepts_data("like") {
            return;
        }
        self.sink.like(like.user(), like.like_count, like.total_like_count);
    }

    fn on_gift(&self, gift: RawGift) {
        if !self.accepts_data("gift") {
            return;
        }
        if gift.is_streak_in_progress() {
            return;
        }
        let gift_name = gift
            .gift_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| GIFT_NAME_PLACEHOLDER.to_string());
        self.sink.gift(
            gift.user(),
            gift.gift_id,
            gift_name,
            gift.gift_picture_url,
            gift.diamond_count,
            gift.repeat_count.unwrap_or(1),
        );
    }

    fn on_room_user(&self, room_user: RawRoomUser) {
        if !self.accepts_data("roomUser") {
            return;
        }
        self.sink.viewer_count(room_user.viewer_count);
    }

    fn on_error(&self, error: UpstreamError) {
        warn!(handle = %self.handle, error = %error, "upstream reported error");
        self.report(&error);
    }

    fn on_disconnected(&self) {
        // swap makes the terminal event fire at most once
        if self.live.swap(false, Ordering::SeqCst) {
            self.sink.disconnected(Some(DISCONNECTED_MESSAGE.to_string()));
        }
    }
}

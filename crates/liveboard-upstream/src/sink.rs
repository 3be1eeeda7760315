use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use liveboard_core::{NormalizedEvent, User};
use tokio::sync::mpsc;
use tracing::debug;

/// Receiver of normalized events, one method per variant.
///
/// Every producer (the connection manager, the synthetic generator) talks to
/// its consumer only through this trait.
pub trait EventSink: Send + Sync {
    fn connected(&self, room_id: String, username: Option<String>);
    fn like(&self, user: User, like_count: u64, total_like_count: u64);
    fn gift(
        &self,
        user: User,
        gift_id: i64,
        gift_name: String,
        gift_image_url: String,
        diamond_value: u64,
        repeat_count: u64,
    );
    fn viewer_count(&self, count: u64);
    fn error(&self, message: String);
    fn disconnected(&self, message: Option<String>);

    /// Route an already-built event to its variant method.
    fn emit(&self, event: NormalizedEvent) {
        match event {
            NormalizedEvent::Connected { room_id, username } => self.connected(room_id, username),
            NormalizedEvent::Like {
                user,
                like_count,
                total_like_count,
            } => self.like(user, like_count, total_like_count),
            NormalizedEvent::Gift {
                user,
                gift_id,
                gift_name,
                gift_image_url,
                diamond_value,
                repeat_count,
            } => self.gift(
                user,
                gift_id,
                gift_name,
                gift_image_url,
                diamond_value,
                repeat_count,
            ),
            NormalizedEvent::ViewerCount { count } => self.viewer_count(count),
            NormalizedEvent::Error { message } => self.error(message),
            NormalizedEvent::Disconnected { message } => self.disconnected(message),
        }
    }
}

/// Sink that funnels every callback into one ordered queue.
///
/// The queue has exactly one reader (the session writer), so events coming
/// from different callback tasks never interleave on the transport. Once the
/// reader is gone, or [`ChannelSink::close`] was called, sends are dropped.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NormalizedEvent>,
    closed: Arc<AtomicBool>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NormalizedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                closed: Arc::new(AtomicBool::new(false)),
            },
            rx,
        )
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn push(&self, event: NormalizedEvent) {
        if self.is_closed() {
            return;
        }
        if self.tx.send(event).is_err() {
            debug!("subscriber gone, marking sink closed");
            self.close();
        }
    }
}

impl EventSink for ChannelSink {
    fn connected(&self, room_id: String, username: Option<String>) {
        self.push(NormalizedEvent::Connected { room_id, username });
    }

    fn like(&self, user: User, like_count: u64, total_like_count: u64) {
        self.push(NormalizedEvent::Like {
            user,
            like_count,
            total_like_count,
        });
    }

    fn gift(
        &self,
        user: User,
        gift_id: i64,
        gift_name: String,
        gift_image_url: String,
        diamond_value: u64,
        repeat_count: u64,
    ) {
        self.push(NormalizedEvent::Gift {
            user,
            gift_id,
            gift_name,
            gift_image_url,
            diamond_value,
            repeat_count,
        });
    }

    fn viewer_count(&self, count: u64) {
        self.push(NormalizedEvent::ViewerCount { count });
    }

    fn error(&self, message: String) {
        self.push(NormalizedEvent::Error { message });
    }

    fn disconnected(&self, message: Option<String>) {
        self.push(NormalizedEvent::Disconnected { message });
    }
}

//! Capability boundary to the live-session client library.
//!
//! The library itself is opaque: it is connected for one handle, pushes
//! typed callbacks while the session lives, and can be torn down at any time.
//! Payloads mirror the library's field names so relay JSON deserializes
//! straight into them.

use std::sync::Arc;

use async_trait::async_trait;
use liveboard_core::User;
use serde::Deserialize;

use crate::error::UpstreamError;

/// Gift type whose messages arrive as a streak of growing `repeatCount`.
pub const STREAKABLE_GIFT_TYPE: i32 = 1;

/// Callbacks pushed by an upstream client, one per message kind.
///
/// Invoked from whatever task drives the client; implementations must not
/// block.
pub trait UpstreamHandler: Send + Sync {
    fn on_connected(&self, room: RoomInfo);
    fn on_like(&self, like: RawLike);
    fn on_gift(&self, gift: RawGift);
    fn on_room_user(&self, room_user: RawRoomUser);
    fn on_error(&self, error: UpstreamError);
    fn on_disconnected(&self);
}

/// One upstream session for one handle.
#[async_trait]
pub trait LiveClient: Send + Sync {
    /// Register the callback target. Must happen before [`LiveClient::connect`].
    fn register(&self, handler: Arc<dyn UpstreamHandler>);

    /// Suspend until the upstream handshake completes or fails.
    async fn connect(&self, handle: &str) -> Result<(), UpstreamError>;

    /// Tear the session down. Synchronous and idempotent; no callbacks are
    /// delivered after it returns.
    fn disconnect(&self);
}

/// Builds a fresh client per connect, the way the library is used.
pub trait LiveClientFactory: Send + Sync {
    fn create(&self, handle: &str) -> Result<Arc<dyn LiveClient>, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLike {
    pub unique_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub profile_picture_url: String,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub total_like_count: u64,
}

impl RawLike {
    pub fn user(&self) -> User {
        User::new(&self.unique_id, &self.nickname, &self.profile_picture_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGift {
    pub unique_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub profile_picture_url: String,
    #[serde(default)]
    pub gift_id: i64,
    #[serde(default)]
    pub gift_name: Option<String>,
    #[serde(default)]
    pub gift_picture_url: String,
    #[serde(default)]
    pub diamond_count: u64,
    #[serde(default)]
    pub repeat_count: Option<u64>,
    #[serde(default)]
    pub repeat_end: Option<bool>,
    #[serde(default)]
    pub gift_type: i32,
}

impl RawGift {
    pub fn user(&self) -> User {
        User::new(&self.unique_id, &self.nickname, &self.profile_picture_url)
    }

    /// A streak message that has not settled yet. Forwarding it would count
    /// the same combo again on every update.
    pub fn is_streak_in_progress(&self) -> bool {
        self.gift_type == STREAKABLE_GIFT_TYPE && !self.repeat_end.unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRoomUser {
    #[serde(default)]
    pub viewer_count: u64,
}

/// One line of the relay's NDJSON stream.
/// Wire: `{ "event": "gift", "uniqueId": "...", "repeatEnd": true, ... }`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum RawMessage {
    Connected(RoomInfo),
    Like(RawLike),
    Gift(RawGift),
    RoomUser(RawRoomUser),
    Error {
        #[serde(default)]
        message: String,
    },
    Disconnected,
    /// Chat, member joins and every other kind the pipeline does not use.
    #[serde(other)]
    Ignored,
}

impl RawMessage {
    /// Hand this message to the matching callback.
    pub fn dispatch(self, handler: &dyn UpstreamHandler) {
        match self {
            RawMessage::Connected(room) => handler.on_connected(room),
            RawMessage::Like(like) => handler.on_like(like),
            RawMessage::Gift(gift) => handler.on_gift(gift),
            RawMessage::RoomUser(room_user) => handler.on_room_user(room_user),
            RawMessage::Error { message } => handler.on_error(UpstreamError::from_raw(message)),
            RawMessage::Disconnected => handler.on_disconnected(),
            RawMessage::Ignored => {}
        }
    }
}

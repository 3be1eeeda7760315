use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A viewer as seen by the live session.
///
/// Identity is `unique_id` only. Nickname and avatar can change between
/// events for the same viewer; derived views always keep the latest values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub unique_id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default, rename = "profilePictureUrl")]
    pub avatar_url: String,
}

impl User {
    pub fn new(
        unique_id: impl Into<String>,
        nickname: impl Into<String>,
        avatar_url: impl Into<String>,
    ) -> Self {
        Self {
            unique_id: unique_id.into(),
            nickname: nickname.into(),
            avatar_url: avatar_url.into(),
        }
    }
}

/// The single event vocabulary shared by every producer and consumer.
///
/// Per session: one `Connected` comes before any `Like`, `Gift` or
/// `ViewerCount`; at most one `Disconnected` ends it and nothing follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    Connected {
        room_id: String,
        /// Handle the room was opened for, when the producer knows it.
        username: Option<String>,
    },
    Like {
        user: User,
        like_count: u64,
        /// Running per-user total as reported upstream. Zero when unknown.
        total_like_count: u64,
    },
    Gift {
        user: User,
        gift_id: i64,
        gift_name: String,
        gift_image_url: String,
        diamond_value: u64,
        repeat_count: u64,
    },
    ViewerCount {
        count: u64,
    },
    Error {
        message: String,
    },
    Disconnected {
        message: Option<String>,
    },
}

impl NormalizedEvent {
    /// Wire discriminator for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::Connected { .. } => "connected",
            NormalizedEvent::Like { .. } => "like",
            NormalizedEvent::Gift { .. } => "gift",
            NormalizedEvent::ViewerCount { .. } => "roomUser",
            NormalizedEvent::Error { .. } => "error",
            NormalizedEvent::Disconnected { .. } => "disconnected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizedEvent::Disconnected { .. })
    }

    /// `diamond_value * repeat_count` for gifts, zero otherwise.
    pub fn spend(&self) -> u64 {
        match self {
            NormalizedEvent::Gift {
                diamond_value,
                repeat_count,
                ..
            } => diamond_value.saturating_mul(*repeat_count),
            _ => 0,
        }
    }
}

/// Accumulated likes for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikerEntry {
    pub user: User,
    pub total_likes: u64,
}

/// Accumulated gift spend for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorEntry {
    pub user: User,
    pub total_diamonds: u64,
    pub gift_count: u64,
}

/// Which producer feeds a broadcast session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    #[default]
    Live,
    Demo,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Live => "live",
            StreamMode::Demo => "demo",
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StreamMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "live" => Ok(StreamMode::Live),
            "demo" => Ok(StreamMode::Demo),
            other => Err(format!("unknown mode: {}", other)),
        }
    }
}

/// Per-subscriber broadcast session identifier (random UUID, not persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

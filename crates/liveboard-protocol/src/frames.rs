use liveboard_core::{NormalizedEvent, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, Result};

/// Discriminators a subscriber can expect in the `type` field.
pub const KNOWN_TYPES: [&str; 6] = [
    "connected",
    "like",
    "gift",
    "roomUser",
    "error",
    "disconnected",
];

/// One server-push message body.
/// Wire: `{ "type": "gift", "user": {...}, "giftId": 3, "diamondCount": 10, ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventFrame {
    #[serde(rename = "connected", rename_all = "camelCase")]
    Connected {
        room_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    #[serde(rename = "like", rename_all = "camelCase")]
    Like {
        user: User,
        like_count: u64,
        #[serde(default)]
        total_like_count: u64,
    },

    #[serde(rename = "gift", rename_all = "camelCase")]
    Gift {
        user: User,
        #[serde(default)]
        gift_id: i64,
        gift_name: String,
        #[serde(default)]
        gift_picture_url: String,
        diamond_count: u64,
        #[serde(default = "one")]
        repeat_count: u64,
    },

    #[serde(rename = "roomUser", rename_all = "camelCase")]
    RoomUser { viewer_count: u64 },

    #[serde(rename = "error")]
    Error { message: String },

    #[serde(rename = "disconnected")]
    Disconnected {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

fn one() -> u64 {
    1
}

impl From<NormalizedEvent> for EventFrame {
    fn from(event: NormalizedEvent) -> Self {
        match event {
            NormalizedEvent::Connected { room_id, username } => {
                EventFrame::Connected { room_id, username }
            }
            NormalizedEvent::Like {
                user,
                like_count,
                total_like_count,
            } => EventFrame::Like {
                user,
                like_count,
                total_like_count,
            },
            NormalizedEvent::Gift {
                user,
                gift_id,
                gift_name,
                gift_image_url,
                diamond_value,
                repeat_count,
            } => EventFrame::Gift {
                user,
                gift_id,
                gift_name,
                gift_picture_url: gift_image_url,
                diamond_count: diamond_value,
                repeat_count,
            },
            NormalizedEvent::ViewerCount { count } => EventFrame::RoomUser {
                viewer_count: count,
            },
            NormalizedEvent::Error { message } => EventFrame::Error { message },
            NormalizedEvent::Disconnected { message } => EventFrame::Disconnected { message },
        }
    }
}

impl From<EventFrame> for NormalizedEvent {
    fn from(frame: EventFrame) -> Self {
        match frame {
            EventFrame::Connected { room_id, username } => {
                NormalizedEvent::Connected { room_id, username }
            }
            EventFrame::Like {
                user,
                like_count,
                total_like_count,
            } => NormalizedEvent::Like {
                user,
                like_count,
                total_like_count,
            },
            EventFrame::Gift {
                user,
                gift_id,
                gift_name,
                gift_picture_url,
                diamond_count,
                repeat_count,
            } => NormalizedEvent::Gift {
                user,
                gift_id,
                gift_name,
                gift_image_url: gift_picture_url,
                diamond_value: diamond_count,
                repeat_count,
            },
            EventFrame::RoomUser { viewer_count } => NormalizedEvent::ViewerCount {
                count: viewer_count,
            },
            EventFrame::Error { message } => NormalizedEvent::Error { message },
            EventFrame::Disconnected { message } => NormalizedEvent::Disconnected { message },
        }
    }
}

/// Serialize an event to the JSON body of one push message.
pub fn encode_event(event: &NormalizedEvent) -> Result<String> {
    let frame = EventFrame::from(event.clone());
    Ok(serde_json::to_string(&frame)?)
}

/// Parse one push message body.
///
/// Dispatches on `type` first so an unrecognised discriminator is reported as
/// such rather than as a generic serde failure. Callers drop and log on error.
pub fn decode_event(payload: &str) -> Result<NormalizedEvent> {
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::UnknownType("<missing>".to_string()))?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownType(kind.to_string()));
    }

    let frame: EventFrame =
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok(frame.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serialized_discriminator() {
        let events = [
            NormalizedEvent::Connected {
                room_id: "r".into(),
                username: None,
            },
            NormalizedEvent::ViewerCount { count: 1 },
            NormalizedEvent::Error {
                message: "x".into(),
            },
            NormalizedEvent::Disconnected { message: None },
        ];
        for ev in events {
            let json: Value = serde_json::from_str(&encode_event(&ev).unwrap()).unwrap();
            assert_eq!(json["type"], ev.kind());
        }
    }

    #[test]
    fn missing_type_is_unknown() {
        let err = decode_event(r#"{"viewerCount": 3}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(_)));
    }

    #[test]
    fn gift_without_repeat_count_defaults_to_one() {
        let json = r#"{"type":"gift","user":{"uniqueId":"a"},"giftName":"Rose","diamondCount":1}"#;
        match decode_event(json).unwrap() {
            NormalizedEvent::Gift { repeat_count, .. } => assert_eq!(repeat_count, 1),
            other => panic!("expected gift, got {other:?}"),
        }
    }
}

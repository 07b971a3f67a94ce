//! Client-to-server WebSocket messages

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::ConnectionManager;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    JoinRide { ride_id: i64 },
    LeaveRide { ride_id: i64 },
    ChatMessage { ride_id: i64, text: String },
    LocationUpdate { ride_id: i64, lat: f64, lng: f64 },
}

const KNOWN_TYPES: [&str; 5] = [
    "ping",
    "join_ride",
    "leave_ride",
    "chat_message",
    "location_update",
];

fn error(message: String) -> JsonValue {
    json!({ "type": "error", "message": message })
}

/// Parse one text frame. The error value is the reply for the sender.
pub fn parse(text: &str) -> Result<ClientMessage, JsonValue> {
    let raw: JsonValue =
        serde_json::from_str(text).map_err(|e| error(format!("Invalid JSON: {e}")))?;

    let kind = raw.get("type").and_then(JsonValue::as_str);
    match kind {
        Some(kind) if KNOWN_TYPES.contains(&kind) => {
            let kind = kind.to_string();
            serde_json::from_value(raw)
                .map_err(|e| error(format!("Invalid {kind} message: {e}")))
        }
        _ => {
            let shown = raw
                .get("type")
                .map(|t| t.as_str().map_or_else(|| t.to_string(), str::to_string))
                .unwrap_or_else(|| "null".to_string());
            Err(error(format!("Unknown message type: {shown}")))
        }
    }
}

/// Apply a message sent by `user_id`. Returns the direct reply, if any.
pub fn handle(manager: &ConnectionManager, user_id: i64, message: ClientMessage) -> Option<JsonValue> {
    match message {
        ClientMessage::Ping => Some(json!({ "type": "pong" })),
        ClientMessage::JoinRide { ride_id } => {
            manager.join_ride(ride_id, user_id);
            Some(json!({ "type": "joined_ride", "ride_id": ride_id }))
        }
        ClientMessage::LeaveRide { ride_id } => {
            manager.leave_ride(ride_id, user_id);
            Some(json!({ "type": "left_ride", "ride_id": ride_id }))
        }
        ClientMessage::ChatMessage { ride_id, text } => {
            manager.send_to_ride(
                ride_id,
                json!({
                    "type": "chat_message",
                    "ride_id": ride_id,
                    "sender_id": user_id,
                    "text": text,
                }),
                None,
            );
            None
        }
        ClientMessage::LocationUpdate { ride_id, lat, lng } => {
            manager.send_to_ride(
                ride_id,
                json!({
                    "type": "driver_location",
                    "ride_id": ride_id,
                    "driver_id": user_id,
                    "lat": lat,
                    "lng": lng,
                }),
                Some(user_id),
            );
            None
        }
    }
}

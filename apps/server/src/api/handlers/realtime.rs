//! WebSocket upgrade plus the HTTP endpoints other services use to push
//! messages to connected users

use crate::{
    api::extract::{ApiJson, ApiPath},
    db::JsonMap,
    realtime::{socket, RealtimeStats},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use serde_json::{json, Value as JsonValue};

pub async fn connect(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ws: WebSocketUpgrade,
) -> Response {
    let manager = state.realtime.clone();
    ws.on_upgrade(move |socket| socket::serve(socket, manager, user_id))
}

pub async fn stats(State(state): State<AppState>) -> ApiJson<RealtimeStats> {
    ApiJson(state.realtime.stats())
}

/// Push a `notification` to every connection of one user.
pub async fn notify(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(message): ApiJson<JsonMap>,
) -> Result<ApiJson<JsonValue>> {
    if !state.realtime.is_connected(user_id) {
        return Err(Error::NotFound("User not connected".to_string()));
    }
    state
        .realtime
        .send_personal(user_id, tagged("notification", message));
    Ok(ApiJson(json!({ "status": "sent", "user_id": user_id })))
}

pub async fn broadcast(
    State(state): State<AppState>,
    ApiJson(message): ApiJson<JsonMap>,
) -> ApiJson<JsonValue> {
    let recipients = state
        .realtime
        .broadcast(tagged("broadcast", message), None);
    tracing::info!(recipients, "Broadcast sent");
    ApiJson(json!({ "status": "broadcasted", "recipients": recipients }))
}

/// `type` first; a `type` supplied by the caller replaces it.
fn tagged(kind: &str, message: JsonMap) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("type".to_string(), JsonValue::from(kind));
    out.extend(message);
    JsonValue::Object(out)
}

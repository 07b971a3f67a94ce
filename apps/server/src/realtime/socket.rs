//! Per-socket session loop

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{protocol, ConnectionManager};

/// Run one WebSocket session for `user_id` until either side closes.
pub async fn serve(socket: WebSocket, manager: Arc<ConnectionManager>, user_id: i64) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<JsonValue>();
    let connection_id = manager.connect(user_id, outbox.clone());

    let writer = tokio::spawn(async move {
        while let Some(message) = inbox.recv().await {
            let text = message.to_string();
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let _ = outbox.send(json!({
        "type": "connected",
        "user_id": user_id,
        "message": "WebSocket connection established",
    }));

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            // Control frames are answered by axum itself.
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "WebSocket receive failed");
                break;
            }
        };

        let reply = match protocol::parse(&text) {
            Ok(message) => protocol::handle(&manager, user_id, message),
            Err(error) => Some(error),
        };
        if let Some(reply) = reply {
            if outbox.send(reply).is_err() {
                break;
            }
        }
    }

    manager.disconnect(user_id, connection_id);
    drop(outbox);
    let _ = writer.await;
}

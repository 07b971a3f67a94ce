//! Real WebSocket sessions against a served router

#[allow(unused)]
mod support;

use anyhow::{bail, Context};
use axum::http::Method;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value as JsonValue};
use std::net::SocketAddr;
use std::time::Duration;
use support::*;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open(addr: SocketAddr, user_id: i64) -> anyhow::Result<Client> {
    let (socket, _response) = connect_async(format!("ws://{addr}{API}/ws/{user_id}")).await?;
    Ok(socket)
}

/// Next JSON text frame, skipping control frames.
async fn next_json(socket: &mut Client) -> anyhow::Result<JsonValue> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .context("no frame within 5s")?
            .context("socket closed")??;
        match frame {
            Message::Text(text) => return Ok(serde_json::from_str(&text)?),
            Message::Close(_) => bail!("socket closed by server"),
            _ => continue,
        }
    }
}

async fn send_json(socket: &mut Client, value: JsonValue) -> anyhow::Result<()> {
    socket.send(Message::Text(value.to_string())).await?;
    Ok(())
}

#[tokio::test]
async fn session_greets_and_answers_protocol_messages() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let addr = spawn_server(&app).await?;
            let mut socket = open(addr, 11).await?;

            let greeting = next_json(&mut socket).await?;
            assert_eq!(greeting["type"], "connected");
            assert_eq!(greeting["user_id"], 11);
            assert!(greeting["message"].is_string());

            send_json(&mut socket, json!({ "type": "ping" })).await?;
            assert_eq!(next_json(&mut socket).await?["type"], "pong");

            send_json(&mut socket, json!({ "type": "join_ride", "ride_id": 5 })).await?;
            let joined = next_json(&mut socket).await?;
            assert_eq!(joined, json!({ "type": "joined_ride", "ride_id": 5 }));
            assert!(app.state.realtime.is_participant(5, 11));

            send_json(&mut socket, json!({ "type": "teleport" })).await?;
            let error = next_json(&mut socket).await?;
            assert_eq!(error["type"], "error");
            assert_eq!(error["message"], "Unknown message type: teleport");

            send_json(&mut socket, json!({ "type": "join_ride" })).await?;
            let error = next_json(&mut socket).await?;
            assert_eq!(error["type"], "error");
            assert!(error["message"]
                .as_str()
                .is_some_and(|m| m.starts_with("Invalid join_ride message")));

            send_json(&mut socket, json!({ "type": "leave_ride", "ride_id": 5 })).await?;
            assert_eq!(next_json(&mut socket).await?["type"], "left_ride");
            assert!(!app.state.realtime.is_participant(5, 11));
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn chat_reaches_every_ride_participant() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let addr = spawn_server(&app).await?;
            let mut rider = open(addr, 21).await?;
            let mut driver = open(addr, 22).await?;
            next_json(&mut rider).await?;
            next_json(&mut driver).await?;

            for socket in [&mut rider, &mut driver] {
                send_json(socket, json!({ "type": "join_ride", "ride_id": 9 })).await?;
                assert_eq!(next_json(socket).await?["type"], "joined_ride");
            }

            send_json(
                &mut rider,
                json!({ "type": "chat_message", "ride_id": 9, "text": "at the gate" }),
            )
            .await?;
            for socket in [&mut rider, &mut driver] {
                let chat = next_json(socket).await?;
                assert_eq!(chat["type"], "chat_message");
                assert_eq!(chat["sender_id"], 21);
                assert_eq!(chat["text"], "at the gate");
            }

            send_json(
                &mut driver,
                json!({ "type": "location_update", "ride_id": 9, "lat": 55.75, "lng": 37.61 }),
            )
            .await?;
            let location = next_json(&mut rider).await?;
            assert_eq!(location["type"], "driver_location");
            assert_eq!(location["driver_id"], 22);
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn closing_the_socket_deregisters_the_user() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let addr = spawn_server(&app).await?;
            let mut socket = open(addr, 31).await?;
            next_json(&mut socket).await?;

            let (_, stats) = app.json(Method::GET, &format!("{API}/ws/stats"), None).await?;
            assert_eq!(stats["online_users"], json!([31]));

            socket.close(None).await?;

            let mut attempts = 0;
            while app.state.realtime.is_connected(31) {
                attempts += 1;
                if attempts > 50 {
                    bail!("user 31 still registered after close");
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let (_, stats) = app.json(Method::GET, &format!("{API}/ws/stats"), None).await?;
            assert_eq!(stats["total_connections"], 0);
            Ok(())
        })
    })
    .await
}

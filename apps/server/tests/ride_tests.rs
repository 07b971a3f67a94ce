//! Ride creation, the status machine and its audit trail

#[allow(unused)]
mod support;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value as JsonValue};
use support::*;

async fn change_status(
    app: &TestApp,
    ride_id: i64,
    body: JsonValue,
) -> anyhow::Result<(StatusCode, JsonValue)> {
    app.json(
        Method::POST,
        &format!("{API}/rides/{ride_id}/status"),
        Some(&body),
    )
    .await
}

#[tokio::test]
async fn create_and_get_ride() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, ride) = app.json(Method::GET, &format!("{API}/rides/{ride_id}"), None).await?;
            assert_status(status, StatusCode::OK, "get ride");
            assert_eq!(ride["status"], "requested");
            assert_eq!(ride["client_id"], client_id);
            assert_eq!(ride["expected_fare"], 350.0);
            assert_eq!(ride["is_anomaly"], false);
            assert!(ride["canceled_at"].is_null());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn ride_status_cannot_be_set_directly() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let (status, ride) = app
                .json(
                    Method::POST,
                    &format!("{API}/rides"),
                    Some(&json!({ "client_id": client_id, "status": "completed" })),
                )
                .await?;
            assert_status(status, StatusCode::CREATED, "create ride");
            assert_eq!(ride["status"], "requested");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn ride_for_unknown_client_is_unprocessable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _) = app
                .json(
                    Method::POST,
                    &format!("{API}/rides"),
                    Some(&json!({ "client_id": 999999999 })),
                )
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "unknown client");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn status_change_of_missing_ride_is_not_found() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, body) = change_status(
                &app,
                999999999,
                json!({ "to_status": "canceled", "actor_role": "client" }),
            )
            .await?;
            assert_status(status, StatusCode::NOT_FOUND, "missing ride");
            assert!(body["detail"].is_string());

            let (status, _) = app
                .json(Method::GET, &format!("{API}/rides/999999999/status-history"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "history of missing ride");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn client_cancels_requested_ride() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, ride) = change_status(
                &app,
                ride_id,
                json!({
                    "to_status": "canceled",
                    "actor_role": "client",
                    "actor_id": client_id,
                    "reason": "Changed my mind",
                }),
            )
            .await?;
            assert_status(status, StatusCode::OK, "cancel");
            assert_eq!(ride["status"], "canceled");
            assert_eq!(ride["cancellation_reason"], "Changed my mind");
            assert!(ride["canceled_at"].is_string());

            let (status, body) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "canceled", "actor_role": "client" }),
            )
            .await?;
            assert_status(status, StatusCode::CONFLICT, "second cancel");
            assert!(body["detail"]
                .as_str()
                .unwrap_or_default()
                .contains("canceled"));

            let (status, history) = app
                .json(Method::GET, &format!("{API}/rides/{ride_id}/status-history"), None)
                .await?;
            assert_status(status, StatusCode::OK, "history");
            let history = history.as_array().cloned().unwrap_or_default();
            assert_eq!(history.len(), 2);
            assert!(history[0]["from_status"].is_null());
            assert_eq!(history[0]["to_status"], "requested");
            assert_eq!(history[1]["from_status"], "requested");
            assert_eq!(history[1]["to_status"], "canceled");
            assert_eq!(history[1]["changed_by"], client_id);
            assert_eq!(history[1]["reason"], "Changed my mind");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn roles_are_held_to_their_transitions() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let driver_user = create_user(&app).await?;
            let profile_id = create_driver_profile(&app, driver_user).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, _) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "driver_assigned", "actor_role": "driver" }),
            )
            .await?;
            assert_status(status, StatusCode::CONFLICT, "driver cannot assign");

            let (status, ride) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "driver_assigned", "actor_role": "system" }),
            )
            .await?;
            assert_status(status, StatusCode::OK, "system assigns");
            assert_eq!(ride["status"], "driver_assigned");

            let (status, _) = app
                .json(
                    Method::PUT,
                    &format!("{API}/rides/{ride_id}"),
                    Some(&json!({ "driver_profile_id": profile_id })),
                )
                .await?;
            assert_status(status, StatusCode::OK, "attach driver");

            for to_status in ["accepted", "arrived", "started", "completed"] {
                let (status, ride) = change_status(
                    &app,
                    ride_id,
                    json!({ "to_status": to_status, "actor_role": "driver", "actor_id": driver_user }),
                )
                .await?;
                assert_status(status, StatusCode::OK, to_status);
                assert_eq!(ride["status"], to_status);
            }

            let (_, ride) = app.json(Method::GET, &format!("{API}/rides/{ride_id}"), None).await?;
            assert!(ride["started_at"].is_string());
            assert!(ride["completed_at"].is_string());
            assert_eq!(ride["driver_profile_id"], profile_id);

            let (status, _) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "canceled", "actor_role": "system" }),
            )
            .await?;
            assert_status(status, StatusCode::CONFLICT, "completed is terminal");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn transition_without_reason_clears_status_reason() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, ride) = change_status(
                &app,
                ride_id,
                json!({
                    "to_status": "driver_assigned",
                    "actor_role": "system",
                    "reason": "driver found"
                }),
            )
            .await?;
            assert_status(status, StatusCode::OK, "system assigns");
            assert_eq!(ride["status_reason"], "driver found");

            let (status, ride) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "accepted", "actor_role": "driver" }),
            )
            .await?;
            assert_status(status, StatusCode::OK, "driver accepts");
            assert_eq!(ride["status"], "accepted");
            assert!(ride["status_reason"].is_null());

            let (_, ride) = app.json(Method::GET, &format!("{API}/rides/{ride_id}"), None).await?;
            assert!(ride["status_reason"].is_null());

            let (status, ride) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "canceled", "actor_role": "client" }),
            )
            .await?;
            assert_status(status, StatusCode::OK, "client cancels");
            assert!(ride["cancellation_reason"].is_null());
            assert!(ride["canceled_at"].is_string());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn unknown_status_or_role_is_unprocessable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, _) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "teleported", "actor_role": "client" }),
            )
            .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "unknown status");

            let (status, _) = change_status(
                &app,
                ride_id,
                json!({ "to_status": "canceled", "actor_role": "admin" }),
            )
            .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "unknown role");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn deleting_a_ride_removes_its_history() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let client_id = create_user(&app).await?;
            let ride_id = create_ride(&app, client_id).await?;

            let (status, _) = app
                .json(Method::DELETE, &format!("{API}/rides/{ride_id}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "delete ride");

            let (status, _) = app
                .json(Method::GET, &format!("{API}/rides/{ride_id}/status-history"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "history after delete");
            Ok(())
        })
    })
    .await
}

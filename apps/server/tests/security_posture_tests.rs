#[allow(unused)]
mod support;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use ridehail::{api::create_router, db::PostgresRecordStore, state::AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use support::*;
use tower::ServiceExt;

fn header<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[tokio::test]
async fn user_data_is_hardened_and_never_cached() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let user_id = create_user(&app).await?;
            let (status, headers, _body) = app
                .request(Method::GET, &format!("{API}/users/{user_id}"), None)
                .await?;
            assert_status(status, StatusCode::OK, "get user");

            assert_eq!(header(&headers, "x-content-type-options"), "nosniff");
            assert_eq!(header(&headers, "x-frame-options"), "DENY");
            assert_eq!(header(&headers, "referrer-policy"), "no-referrer");
            assert_eq!(
                header(&headers, "content-security-policy"),
                "default-src 'none'; frame-ancestors 'none'"
            );
            assert_eq!(header(&headers, "cache-control"), "no-store");
            assert!(headers.get("strict-transport-security").is_none());

            // Error bodies leak ids too.
            let (status, headers, _body) = app
                .request(Method::GET, &format!("{API}/rides/999999"), None)
                .await?;
            assert_status(status, StatusCode::NOT_FOUND, "missing ride");
            assert_eq!(header(&headers, "cache-control"), "no-store");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn hsts_is_sent_behind_tls_proxy() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (_status, headers, _body) = app
                .request_with_extra_headers(
                    Method::GET,
                    &format!("{API}/health"),
                    None,
                    &[("x-forwarded-proto", "https")],
                )
                .await?;
            assert_eq!(
                header(&headers, "strict-transport-security"),
                "max-age=31536000; includeSubDomains"
            );
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn websocket_handshake_skips_document_headers() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let addr = spawn_server(&app).await?;
            let (_socket, response) =
                tokio_tungstenite::connect_async(format!("ws://{addr}{API}/ws/41")).await?;
            assert_eq!(response.status().as_u16(), 101);
            let headers = response.headers();
            assert_eq!(
                headers.get("x-content-type-options").and_then(|v| v.to_str().ok()),
                Some("nosniff")
            );
            assert!(headers.get("content-security-policy").is_none());
            assert!(headers.get("cache-control").is_none());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn cors_is_not_permissive_by_default() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, headers, _body) = app
                .request_with_extra_headers(
                    Method::GET,
                    "/health",
                    None,
                    &[("origin", "https://evil.example")],
                )
                .await?;
            assert_status(status, StatusCode::OK, "health");
            assert!(
                headers.get("access-control-allow-origin").is_none(),
                "expected no permissive CORS by default"
            );
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn cors_allows_configured_origin_only() -> anyhow::Result<()> {
    with_test_app_with_config(
        |config| {
            config.server.cors_origins = vec!["https://bot.example".to_string()];
        },
        |app| {
            Box::pin(async move {
                let (_status, headers, _body) = app
                    .request_with_extra_headers(
                        Method::GET,
                        "/health",
                        None,
                        &[("origin", "https://bot.example")],
                    )
                    .await?;
                assert_eq!(
                    headers
                        .get("access-control-allow-origin")
                        .and_then(|v| v.to_str().ok()),
                    Some("https://bot.example")
                );

                let (_status, headers, _body) = app
                    .request_with_extra_headers(
                        Method::GET,
                        "/health",
                        None,
                        &[("origin", "https://evil.example")],
                    )
                    .await?;
                assert!(headers.get("access-control-allow-origin").is_none());
                Ok(())
            })
        },
    )
    .await
}

#[tokio::test]
async fn health_reports_storage_at_every_path() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            for path in ["/health".to_string(), "/".to_string(), format!("{API}/health")] {
                let (status, body) = app.json(Method::GET, &path, None).await?;
                assert_status(status, StatusCode::OK, &path);
                assert_eq!(body["status"], "ok");
                assert_eq!(body["storage"], "ok");
            }
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn oversized_body_is_rejected() -> anyhow::Result<()> {
    with_test_app_with_config(
        |config| config.server.max_request_body_size = 64,
        |app| {
            Box::pin(async move {
                let payload = serde_json::json!({
                    "code": "x".repeat(40),
                    "name": "y".repeat(40),
                });
                let (status, _headers, body) = app
                    .request(
                        Method::POST,
                        &format!("{API}/roles"),
                        Some(to_json_body(&payload)?),
                    )
                    .await?;
                assert_status(status, StatusCode::PAYLOAD_TOO_LARGE, "oversized body");
                let body: serde_json::Value = serde_json::from_slice(&body)?;
                assert!(body["detail"].is_string());
                Ok(())
            })
        },
    )
    .await
}

#[tokio::test]
async fn json_body_without_content_type_is_unsupported() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let request = Request::builder()
                .method(Method::POST)
                .uri(format!("{API}/roles"))
                .body(Body::from(r#"{"code":"driver","name":"Driver"}"#))?;
            let (status, _headers, body) = app.send(request).await?;
            assert_status(status, StatusCode::UNSUPPORTED_MEDIA_TYPE, "missing content-type");
            let body: serde_json::Value = serde_json::from_slice(&body)?;
            assert!(body["detail"].is_string());
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn malformed_json_stays_unprocessable() -> anyhow::Result<()> {
    with_test_app(|app| {
        Box::pin(async move {
            let (status, _headers, _body) = app
                .request(Method::POST, &format!("{API}/roles"), Some(b"{not json".to_vec()))
                .await?;
            assert_status(status, StatusCode::UNPROCESSABLE_ENTITY, "syntax error");
            Ok(())
        })
    })
    .await
}

#[tokio::test]
async fn health_reports_unreachable_storage() -> anyhow::Result<()> {
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(500))
        .connect_lazy("postgresql://ridehail@127.0.0.1:1/ridehail")?;
    let state = AppState::with_store(
        test_config(),
        Arc::new(PostgresRecordStore::new(pool.clone())),
        Some(pool),
    );
    let router = create_router(state);

    for path in ["/health", "/api/v1/health"] {
        let request = Request::builder().uri(path).body(Body::empty())?;
        let response = router.clone().oneshot(request).await?;
        assert_status(response.status(), StatusCode::SERVICE_UNAVAILABLE, path);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: serde_json::Value = serde_json::from_slice(&bytes)?;
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["storage"], "unreachable");
    }
    Ok(())
}

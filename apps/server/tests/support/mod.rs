//! Shared harness for the integration tests
//!
//! Every test gets a fresh router. The memory backend is used unless
//! `RIDEHAIL__DATABASE__TEST_DATABASE_URL` points at a PostgreSQL database,
//! so tests build their natural keys with `unique_id()` to stay independent
//! on a shared database.

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use ridehail::{
    api::create_router,
    config::{Config, StorageBackend},
    state::{AppState, AppStateOptions},
};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use tower::ServiceExt;

pub type TestFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

pub const API: &str = "/api/v1";

#[derive(Clone)]
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        self.request_with_extra_headers(method, path, body, &[])
            .await
    }

    pub async fn request_with_extra_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let mut builder = Request::builder().method(method).uri(path);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty))?;
        self.send(request).await
    }

    /// Send a prebuilt request as is.
    pub async fn send(
        &self,
        request: Request<Body>,
    ) -> anyhow::Result<(StatusCode, HeaderMap, Vec<u8>)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, headers, bytes.to_vec()))
    }

    /// Request with a JSON body, returning the parsed JSON response.
    pub async fn json(
        &self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
    ) -> anyhow::Result<(StatusCode, JsonValue)> {
        let body = body.map(to_json_body).transpose()?;
        let (status, _headers, bytes) = self.request(method, path, body).await?;
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, json))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    match std::env::var("RIDEHAIL__DATABASE__TEST_DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => {
            config.database.backend = StorageBackend::Postgres;
            config.database.url = url;
            config.database.pool_min_size = 0;
            config.database.pool_max_size = 4;
        }
        _ => config.database.backend = StorageBackend::Memory,
    }
    config
}

pub async fn with_test_app<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce(TestApp) -> TestFuture,
{
    with_test_app_with_config(|_| {}, f).await
}

pub async fn with_test_app_with_config<C, F>(configure: C, f: F) -> anyhow::Result<()>
where
    C: FnOnce(&mut Config),
    F: FnOnce(TestApp) -> TestFuture,
{
    let mut config = test_config();
    configure(&mut config);

    let state = AppState::new_with_options(
        config,
        AppStateOptions {
            run_migrations: true,
        },
    )
    .await?;
    let app = TestApp {
        router: create_router(state.clone()),
        state,
    };
    f(app).await
}

/// Serve `app` on an ephemeral local port for clients that need a real socket.
pub async fn spawn_server(app: &TestApp) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let router = app.router.clone();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

pub fn to_json_body(value: &JsonValue) -> anyhow::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn assert_status(actual: StatusCode, expected: StatusCode, context: &str) {
    assert_eq!(
        actual, expected,
        "unexpected status for {context}: got {actual}, expected {expected}"
    );
}

/// Process-unique positive id for natural keys such as Telegram ids.
pub fn unique_id() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(0);
    let base = chrono::Utc::now().timestamp_micros() % 1_000_000_000_000;
    base * 1_000 + NEXT.fetch_add(1, Ordering::Relaxed) % 1_000
}

/// Get-or-create a user and return its id.
pub async fn create_user(app: &TestApp) -> anyhow::Result<i64> {
    let telegram_id = unique_id();
    let (status, user) = app
        .json(
            Method::POST,
            &format!("{API}/users/{telegram_id}"),
            Some(&serde_json::json!({ "first_name": "Test" })),
        )
        .await?;
    assert_status(status, StatusCode::OK, "create user");
    user["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("user without id: {user}"))
}

pub async fn create_driver_profile(app: &TestApp, user_id: i64) -> anyhow::Result<i64> {
    let (status, profile) = app
        .json(
            Method::POST,
            &format!("{API}/driver-profiles"),
            Some(&serde_json::json!({
                "user_id": user_id,
                "license_number": format!("LIC-{user_id}"),
                "car_make": "Lada",
                "car_model": "Vesta",
                "car_plate": "A123BC",
            })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create driver profile");
    profile["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("profile without id: {profile}"))
}

pub async fn create_ride(app: &TestApp, client_id: i64) -> anyhow::Result<i64> {
    let (status, ride) = app
        .json(
            Method::POST,
            &format!("{API}/rides"),
            Some(&serde_json::json!({
                "client_id": client_id,
                "pickup_address": "Lenina 1",
                "dropoff_address": "Pushkina 10",
                "expected_fare": 350.0,
            })),
        )
        .await?;
    assert_status(status, StatusCode::CREATED, "create ride");
    ride["id"]
        .as_i64()
        .ok_or_else(|| anyhow::anyhow!("ride without id: {ride}"))
}

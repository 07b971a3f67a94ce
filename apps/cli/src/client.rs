use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;

/// Thin JSON client bound to one server and API prefix.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    prefix: String,
}

impl ApiClient {
    pub fn new(base_url: &str, prefix: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Call `path` under the API prefix.
    pub async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let url = format!("{}{}{}", self.base_url, self.prefix, path);
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("{method} {url}"))?;
        let status = response.status();
        let text = response.text().await?;
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, json))
    }
}

pub fn expect_status(actual: StatusCode, expected: StatusCode, what: &str, body: &Value) -> Result<()> {
    if actual != expected {
        bail!("{what}: expected {expected}, got {actual}: {body}");
    }
    Ok(())
}

pub fn id_of(value: &Value, what: &str) -> Result<i64> {
    value["id"]
        .as_i64()
        .with_context(|| format!("{what} response has no id: {value}"))
}

/// Telegram-style id unlikely to collide with earlier runs on the same database.
pub fn unique_telegram_id() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(0);
    let base = chrono::Utc::now().timestamp_millis() % 1_000_000_000;
    base * 100 + NEXT.fetch_add(1, Ordering::Relaxed) % 100
}

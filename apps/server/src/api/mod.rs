//! HTTP surface: router, handlers, extractors and middleware

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;

use crate::{config::Config, state::AppState};
use axum::{extract::DefaultBodyLimit, http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the application router.
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();
    let api = routes::api_routes(config.realtime.enabled);

    let router = Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check));
    let router = if config.api.prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&config.api.prefix, api)
    };

    let router = router
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(DefaultBodyLimit::max(config.server.max_request_body_size));

    let router = match cors_layer(&config) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the configured origins only. No origins means no CORS headers.
fn cors_layer(config: &Config) -> Option<CorsLayer> {
    let origins = &config.server.cors_origins;
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

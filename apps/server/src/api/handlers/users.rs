//! User endpoints that differ from the generic collection handlers

use crate::{
    api::extract::{ApiJson, ApiPath},
    db::BalanceRefresh,
    models::{User, UserCreate},
    state::AppState,
    Error, Result,
};
use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
};

/// `POST /users/{telegram_id}`: return the user with this Telegram id,
/// creating it from the body when unknown.
pub async fn get_or_create(
    State(state): State<AppState>,
    ApiPath(telegram_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UserCreate>,
) -> Result<ApiJson<User>> {
    let (user, _created) = state
        .user_service
        .get_or_create(telegram_id, payload)
        .await?;
    Ok(ApiJson(user))
}

/// `PATCH /users/update_user_balance/{user_id}`
///
/// The bot forwards its session as a form-encoded `Authorization` header;
/// a `user_id` pair found there wins over the path parameter.
pub async fn update_user_balance(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    headers: HeaderMap,
) -> Result<ApiJson<BalanceRefresh>> {
    let user_id = authorized_user_id(&headers)?.unwrap_or(user_id);
    Ok(ApiJson(state.user_service.refresh_balance(user_id).await?))
}

fn authorized_user_id(headers: &HeaderMap) -> Result<Option<i64>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let Some(raw) = url::form_urlencoded::parse(value.as_bytes())
        .find(|(key, _)| key == "user_id")
        .map(|(_, value)| value)
    else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>().map(Some).map_err(|_| {
        Error::Validation(format!(
            "user_id in Authorization header must be an integer (got '{raw}')"
        ))
    })
}

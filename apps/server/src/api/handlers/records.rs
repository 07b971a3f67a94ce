//! Generic collection handlers
//!
//! Each handler is instantiated once per record type by the router.

use crate::{
    api::extract::{ApiJson, ApiPath, ApiQuery},
    db::ListQuery,
    models::Record,
    state::AppState,
    Result,
};
use axum::{extract::State, http::StatusCode};
use std::collections::HashMap;

fn list_query<R: Record>(state: &AppState, params: &HashMap<String, String>) -> Result<ListQuery> {
    ListQuery::from_params(
        R::TABLE,
        params,
        state.config.api.default_page_size,
        state.config.api.max_page_size,
    )
}

pub async fn list<R: Record>(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> Result<ApiJson<Vec<R>>> {
    let query = list_query::<R>(&state, &params)?;
    Ok(ApiJson(state.crud::<R>().list(&query).await?))
}

/// Number of rows matching the same filters `list` accepts.
pub async fn count<R: Record>(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HashMap<String, String>>,
) -> Result<ApiJson<i64>> {
    let query = list_query::<R>(&state, &params)?;
    Ok(ApiJson(state.crud::<R>().count(&query.filters).await?))
}

pub async fn get<R: Record>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiJson<R>> {
    Ok(ApiJson(state.crud::<R>().get(id).await?))
}

pub async fn create<R: Record>(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<R::Create>,
) -> Result<(StatusCode, ApiJson<R>)> {
    let record = state.crud::<R>().create(payload).await?;
    Ok((StatusCode::CREATED, ApiJson(record)))
}

pub async fn update<R: Record>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<R::Update>,
) -> Result<ApiJson<R>> {
    Ok(ApiJson(state.crud::<R>().update(id, payload).await?))
}

/// Returns the deleted record.
pub async fn delete<R: Record>(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<ApiJson<R>> {
    Ok(ApiJson(state.crud::<R>().delete(id).await?))
}

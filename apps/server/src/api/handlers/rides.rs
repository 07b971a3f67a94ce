use crate::{
    api::extract::{ApiJson, ApiPath},
    models::{Ride, RideCreate, RideStatusChangeRequest, RideStatusHistory},
    state::AppState,
    Result,
};
use axum::{extract::State, http::StatusCode};

pub async fn create_ride(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RideCreate>,
) -> Result<(StatusCode, ApiJson<Ride>)> {
    let ride = state.ride_service.create(payload).await?;
    Ok((StatusCode::CREATED, ApiJson(ride)))
}

pub async fn change_status(
    State(state): State<AppState>,
    ApiPath(ride_id): ApiPath<i64>,
    ApiJson(request): ApiJson<RideStatusChangeRequest>,
) -> Result<ApiJson<Ride>> {
    Ok(ApiJson(
        state.ride_service.change_status(ride_id, request).await?,
    ))
}

pub async fn status_history(
    State(state): State<AppState>,
    ApiPath(ride_id): ApiPath<i64>,
) -> Result<ApiJson<Vec<RideStatusHistory>>> {
    Ok(ApiJson(state.ride_service.status_history(ride_id).await?))
}

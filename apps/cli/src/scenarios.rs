//! The fixed smoke scenario list. Each case creates the data it needs.

use std::future::Future;
use std::pin::Pin;

use anyhow::{ensure, Result};
use reqwest::{Method, StatusCode};
use serde_json::json;

use crate::client::{expect_status, id_of, unique_telegram_id, ApiClient};

pub type CaseFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

pub struct Case {
    pub name: &'static str,
    pub group: &'static str,
    pub run: for<'a> fn(&'a ApiClient) -> CaseFuture<'a>,
}

pub fn all() -> Vec<Case> {
    vec![
        Case { name: "users_crud_full_cycle", group: "Users", run: users_crud_full_cycle },
        Case { name: "users_update_nonexistent", group: "Users", run: users_update_nonexistent },
        Case { name: "roles_crud_full_cycle", group: "Roles", run: roles_crud_full_cycle },
        Case { name: "roles_delete_nonexistent", group: "Roles", run: roles_delete_nonexistent },
        Case { name: "rides_create_and_get", group: "Rides", run: rides_create_and_get },
        Case { name: "rides_change_status_not_found", group: "Rides", run: rides_change_status_not_found },
        Case { name: "rides_change_status_success", group: "Rides", run: rides_change_status_success },
        Case { name: "driver_profile_create_success", group: "Driver Profiles", run: driver_profile_create_success },
        Case { name: "driver_profile_duplicate_user", group: "Driver Profiles", run: driver_profile_duplicate_user },
        Case { name: "driver_location_foreign_key_error", group: "Driver Locations", run: driver_location_foreign_key_error },
        Case { name: "driver_location_create_success", group: "Driver Locations", run: driver_location_create_success },
        Case { name: "commissions_crud", group: "Commissions", run: commissions_crud },
        Case { name: "commissions_delete_nonexistent", group: "Commissions", run: commissions_delete_nonexistent },
        Case { name: "transactions_delete_nonexistent", group: "Transactions", run: transactions_delete_nonexistent },
        Case { name: "health_endpoint", group: "Health", run: health_endpoint },
    ]
}

async fn create_user(api: &ApiClient, first_name: &str) -> Result<(i64, i64)> {
    let telegram_id = unique_telegram_id();
    let (status, body) = api
        .call(
            Method::POST,
            &format!("/users/{telegram_id}"),
            Some(json!({
                "telegram_id": telegram_id,
                "first_name": first_name,
                "username": format!("smoke_{telegram_id}"),
            })),
        )
        .await?;
    expect_status(status, StatusCode::OK, "create user", &body)?;
    Ok((id_of(&body, "user")?, telegram_id))
}

async fn create_profile(api: &ApiClient, user_id: i64, license: String) -> Result<(StatusCode, serde_json::Value)> {
    api.call(
        Method::POST,
        "/driver-profiles",
        Some(json!({ "user_id": user_id, "license_number": license, "approved": false })),
    )
    .await
}

async fn create_ride(api: &ApiClient, client_id: i64) -> Result<i64> {
    let (status, body) = api
        .call(
            Method::POST,
            "/rides",
            Some(json!({
                "client_id": client_id,
                "pickup_address": "Test Street 1",
                "pickup_lat": 50.4501,
                "pickup_lng": 30.5234,
                "dropoff_address": "Test Street 2",
                "dropoff_lat": 50.46,
                "dropoff_lng": 30.53,
                "expected_fare": 150.0,
                "expected_fare_snapshot": { "base": 50, "distance": 100 },
            })),
        )
        .await?;
    expect_status(status, StatusCode::CREATED, "create ride", &body)?;
    ensure!(body["status"] == "requested", "new ride has status {}", body["status"]);
    id_of(&body, "ride")
}

async fn expect_missing(api: &ApiClient, method: Method, path: &str) -> Result<String> {
    let (status, body) = api.call(method.clone(), path, None).await?;
    expect_status(status, StatusCode::NOT_FOUND, &format!("{method} {path}"), &body)?;
    Ok(format!("{method} {path} -> 404"))
}

fn users_crud_full_cycle(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (user_id, telegram_id) = create_user(api, "SmokeCRUD").await?;

        let (status, again) = api
            .call(
                Method::POST,
                &format!("/users/{telegram_id}"),
                Some(json!({ "telegram_id": telegram_id, "first_name": "Different" })),
            )
            .await?;
        expect_status(status, StatusCode::OK, "repeat get-or-create", &again)?;
        ensure!(again["id"] == user_id, "get-or-create returned another user");
        ensure!(again["first_name"] == "SmokeCRUD", "existing user was modified");

        let (status, updated) = api
            .call(
                Method::PUT,
                &format!("/users/{user_id}"),
                Some(json!({ "first_name": "UpdatedName", "balance": 100.0 })),
            )
            .await?;
        expect_status(status, StatusCode::OK, "update user", &updated)?;
        ensure!(updated["first_name"] == "UpdatedName", "update not applied");

        let (status, list) = api.call(Method::GET, "/users?page=1&page_size=100", None).await?;
        expect_status(status, StatusCode::OK, "list users", &list)?;
        ensure!(list.is_array(), "user list is not an array");
        Ok(format!("user {user_id} created, re-read and updated"))
    })
}

fn users_update_nonexistent(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (status, body) = api
            .call(
                Method::PUT,
                "/users/999999",
                Some(json!({ "first_name": "Ghost", "username": "ghost" })),
            )
            .await?;
        ensure!(
            matches!(status, StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY),
            "expected 404 or 422, got {status}: {body}"
        );
        Ok(format!("PUT /users/999999 -> {}", status.as_u16()))
    })
}

fn roles_crud_full_cycle(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let code = format!("smoke_role_{}", unique_telegram_id());
        let (status, role) = api
            .call(
                Method::POST,
                "/roles",
                Some(json!({ "code": code, "name": "Smoke Role", "description": "Role for smoke testing" })),
            )
            .await?;
        expect_status(status, StatusCode::CREATED, "create role", &role)?;
        let role_id = id_of(&role, "role")?;
        let path = format!("/roles/{role_id}");

        let (status, body) = api.call(Method::GET, &path, None).await?;
        expect_status(status, StatusCode::OK, "get role", &body)?;

        let (status, body) = api
            .call(Method::PUT, &path, Some(json!({ "name": "Updated Role Name" })))
            .await?;
        expect_status(status, StatusCode::OK, "update role", &body)?;
        ensure!(body["name"] == "Updated Role Name", "update not applied");

        let (status, body) = api.call(Method::DELETE, &path, None).await?;
        expect_status(status, StatusCode::OK, "delete role", &body)?;

        let (status, body) = api.call(Method::GET, &path, None).await?;
        expect_status(status, StatusCode::NOT_FOUND, "get deleted role", &body)?;
        Ok(format!("role {role_id} created, updated and deleted"))
    })
}

fn roles_delete_nonexistent(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(expect_missing(api, Method::DELETE, "/roles/999999"))
}

fn rides_create_and_get(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (client_id, _) = create_user(api, "RideClient").await?;
        let ride_id = create_ride(api, client_id).await?;

        let (status, ride) = api.call(Method::GET, &format!("/rides/{ride_id}"), None).await?;
        expect_status(status, StatusCode::OK, "get ride", &ride)?;
        ensure!(ride["client_id"] == client_id, "ride has wrong client");
        Ok(format!("ride {ride_id} requested"))
    })
}

fn rides_change_status_not_found(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (status, body) = api
            .call(
                Method::POST,
                "/rides/999999/status",
                Some(json!({ "to_status": "canceled", "reason": "Test", "actor_id": 1, "actor_role": "client" })),
            )
            .await?;
        expect_status(status, StatusCode::NOT_FOUND, "status change of missing ride", &body)?;
        Ok("POST /rides/999999/status -> 404".to_string())
    })
}

fn rides_change_status_success(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (client_id, _) = create_user(api, "StatusClient").await?;
        let ride_id = create_ride(api, client_id).await?;

        let (status, ride) = api
            .call(
                Method::POST,
                &format!("/rides/{ride_id}/status"),
                Some(json!({
                    "to_status": "canceled",
                    "reason": "Changed my mind",
                    "actor_id": client_id,
                    "actor_role": "client",
                })),
            )
            .await?;
        expect_status(status, StatusCode::OK, "cancel ride", &ride)?;
        ensure!(ride["status"] == "canceled", "ride status is {}", ride["status"]);
        Ok(format!("ride {ride_id} requested -> canceled"))
    })
}

fn driver_profile_create_success(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (user_id, telegram_id) = create_user(api, "NewDriver").await?;
        let (status, profile) = create_profile(api, user_id, format!("LIC{telegram_id}")).await?;
        expect_status(status, StatusCode::CREATED, "create driver profile", &profile)?;
        ensure!(profile["user_id"] == user_id, "profile has wrong user");
        Ok(format!("driver profile {} created", profile["id"]))
    })
}

fn driver_profile_duplicate_user(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (user_id, telegram_id) = create_user(api, "DuplicateDriver").await?;
        let (status, body) = create_profile(api, user_id, format!("FIRST{telegram_id}")).await?;
        expect_status(status, StatusCode::CREATED, "first driver profile", &body)?;
        let (status, body) = create_profile(api, user_id, format!("SECOND{telegram_id}")).await?;
        expect_status(status, StatusCode::CONFLICT, "second driver profile", &body)?;
        Ok("second profile for the same user -> 409".to_string())
    })
}

fn driver_location_foreign_key_error(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (status, body) = api
            .call(
                Method::POST,
                "/driver-locations",
                Some(json!({ "driver_profile_id": 999999, "latitude": 50.4501, "longitude": 30.5234, "is_online": true })),
            )
            .await?;
        expect_status(status, StatusCode::UNPROCESSABLE_ENTITY, "location for missing profile", &body)?;
        Ok("location for missing profile -> 422".to_string())
    })
}

fn driver_location_create_success(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (user_id, telegram_id) = create_user(api, "LocationDriver").await?;
        let (status, profile) = create_profile(api, user_id, format!("LOC{telegram_id}")).await?;
        expect_status(status, StatusCode::CREATED, "create driver profile", &profile)?;
        let profile_id = id_of(&profile, "driver profile")?;

        let (status, location) = api
            .call(
                Method::POST,
                "/driver-locations",
                Some(json!({ "driver_profile_id": profile_id, "latitude": 50.4501, "longitude": 30.5234, "is_online": true })),
            )
            .await?;
        expect_status(status, StatusCode::CREATED, "create location", &location)?;
        ensure!(location["driver_profile_id"] == profile_id, "location has wrong profile");
        ensure!(location["is_online"] == true, "location is not online");
        Ok(format!("location {} for profile {profile_id}", location["id"]))
    })
}

fn commissions_crud(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (status, commission) = api
            .call(
                Method::POST,
                "/commissions",
                Some(json!({ "name": format!("Smoke Commission {}", unique_telegram_id()), "percent": 15.0, "is_active": true })),
            )
            .await?;
        expect_status(status, StatusCode::CREATED, "create commission", &commission)?;
        let path = format!("/commissions/{}", id_of(&commission, "commission")?);

        let (status, body) = api.call(Method::GET, &path, None).await?;
        expect_status(status, StatusCode::OK, "get commission", &body)?;
        let (status, body) = api.call(Method::DELETE, &path, None).await?;
        expect_status(status, StatusCode::OK, "delete commission", &body)?;
        Ok(format!("{path} created, read and deleted"))
    })
}

fn commissions_delete_nonexistent(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(expect_missing(api, Method::DELETE, "/commissions/999999"))
}

fn transactions_delete_nonexistent(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(expect_missing(api, Method::DELETE, "/transactions/999999"))
}

fn health_endpoint(api: &ApiClient) -> CaseFuture<'_> {
    Box::pin(async move {
        let (status, body) = api.call(Method::GET, "/health", None).await?;
        expect_status(status, StatusCode::OK, "health", &body)?;
        Ok(format!("storage: {}", body["storage"]))
    })
}

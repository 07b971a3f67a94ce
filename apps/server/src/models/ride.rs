//! Rides and their status machine
//!
//! Each actor role has its own transition table. A change is allowed when the
//! target is listed for the ride's current status under the acting role.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Requested,
    DriverAssigned,
    Accepted,
    Arrived,
    Started,
    Completed,
    Canceled,
}

impl RideStatus {
    pub const ALL: [RideStatus; 7] = [
        RideStatus::Requested,
        RideStatus::DriverAssigned,
        RideStatus::Accepted,
        RideStatus::Arrived,
        RideStatus::Started,
        RideStatus::Completed,
        RideStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Requested => "requested",
            RideStatus::DriverAssigned => "driver_assigned",
            RideStatus::Accepted => "accepted",
            RideStatus::Arrived => "arrived",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Canceled)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RideStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown ride status '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Client,
    Driver,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Client => "client",
            ActorRole::Driver => "driver",
            ActorRole::System => "system",
        }
    }

    /// Targets this role may move a ride to from `from`.
    pub fn allowed_targets(&self, from: RideStatus) -> &'static [RideStatus] {
        use RideStatus::*;
        match (self, from) {
            (_, Completed | Canceled) => &[],
            (ActorRole::Client, Requested | DriverAssigned | Accepted) => &[Canceled],
            (ActorRole::Client, _) => &[],
            (ActorRole::Driver, Requested) => &[],
            (ActorRole::System, Requested) => &[DriverAssigned, Canceled],
            (ActorRole::Driver | ActorRole::System, DriverAssigned) => &[Accepted, Canceled],
            (ActorRole::Driver | ActorRole::System, Accepted) => &[Arrived, Canceled],
            (ActorRole::Driver | ActorRole::System, Arrived) => &[Started, Canceled],
            (ActorRole::Driver | ActorRole::System, Started) => &[Completed, Canceled],
        }
    }

    pub fn can_transition(&self, from: RideStatus, to: RideStatus) -> bool {
        self.allowed_targets(from).contains(&to)
    }

    /// Every current status from which this role may reach `to`.
    pub fn allowed_sources(&self, to: RideStatus) -> Vec<RideStatus> {
        RideStatus::ALL
            .into_iter()
            .filter(|from| self.can_transition(*from, to))
            .collect()
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ride {
    pub id: i64,
    pub client_id: i64,
    pub driver_profile_id: Option<i64>,
    pub status: RideStatus,
    pub status_reason: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub pickup_address: Option<String>,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_address: Option<String>,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub expected_fare: Option<Decimal>,
    pub expected_fare_snapshot: Option<JsonValue>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub driver_fare: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub actual_fare: Option<Decimal>,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub transaction_id: Option<i64>,
    pub commission_id: Option<i64>,
    pub is_anomaly: bool,
    pub anomaly_reason: Option<String>,
    pub ride_metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New ride request. The status always starts at `requested`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RideCreate {
    pub client_id: i64,
    pub driver_profile_id: Option<i64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub pickup_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub pickup_lng: Option<f64>,
    pub dropoff_address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub dropoff_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub dropoff_lng: Option<f64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub expected_fare: Option<Decimal>,
    pub expected_fare_snapshot: Option<JsonValue>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub driver_fare: Option<Decimal>,
    #[validate(range(min = 0))]
    pub distance_meters: Option<i64>,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i64>,
    pub commission_id: Option<i64>,
    pub ride_metadata: Option<JsonValue>,
}

/// Field changes outside the status machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct RideUpdate {
    pub driver_profile_id: Option<i64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub pickup_address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub pickup_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub pickup_lng: Option<f64>,
    pub dropoff_address: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub dropoff_lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub dropoff_lng: Option<f64>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub expected_fare: Option<Decimal>,
    pub expected_fare_snapshot: Option<JsonValue>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub driver_fare: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub actual_fare: Option<Decimal>,
    #[validate(range(min = 0))]
    pub distance_meters: Option<i64>,
    #[validate(range(min = 0))]
    pub duration_seconds: Option<i64>,
    pub transaction_id: Option<i64>,
    pub commission_id: Option<i64>,
    pub is_anomaly: Option<bool>,
    pub anomaly_reason: Option<String>,
    pub ride_metadata: Option<JsonValue>,
}

impl Record for Ride {
    const TABLE: &'static TableSpec = &tables::RIDES;
    type Create = RideCreate;
    type Update = RideUpdate;
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RideStatusChangeRequest {
    pub to_status: RideStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub actor_id: Option<i64>,
    pub actor_role: ActorRole,
    pub meta: Option<JsonValue>,
}

/// One audited status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideStatusHistory {
    pub id: i64,
    pub ride_id: i64,
    pub from_status: Option<RideStatus>,
    pub to_status: RideStatus,
    pub changed_by: Option<i64>,
    pub actor_role: Option<ActorRole>,
    pub reason: Option<String>,
    pub meta: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

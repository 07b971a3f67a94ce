use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

/// Driver-specific data attached to a user. One per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: i64,
    pub user_id: i64,
    pub license_number: Option<String>,
    pub car_make: Option<String>,
    pub car_model: Option<String>,
    pub car_color: Option<String>,
    pub car_plate: Option<String>,
    pub approved: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub rating: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverProfileCreate {
    pub user_id: i64,
    #[validate(length(max = 50))]
    pub license_number: Option<String>,
    #[validate(length(max = 50))]
    pub car_make: Option<String>,
    #[validate(length(max = 50))]
    pub car_model: Option<String>,
    #[validate(length(max = 30))]
    pub car_color: Option<String>,
    #[validate(length(max = 20))]
    pub car_plate: Option<String>,
    pub approved: Option<bool>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::rating"))]
    pub rating: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DriverProfileUpdate {
    #[validate(length(max = 50))]
    pub license_number: Option<String>,
    #[validate(length(max = 50))]
    pub car_make: Option<String>,
    #[validate(length(max = 50))]
    pub car_model: Option<String>,
    #[validate(length(max = 30))]
    pub car_color: Option<String>,
    #[validate(length(max = 20))]
    pub car_plate: Option<String>,
    pub approved: Option<bool>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::rating"))]
    pub rating: Option<Decimal>,
}

impl Record for DriverProfile {
    const TABLE: &'static TableSpec = &tables::DRIVER_PROFILES;
    type Create = DriverProfileCreate;
    type Update = DriverProfileUpdate;
}

/// Last known position of a driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverLocation {
    pub id: i64,
    pub driver_profile_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_online: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverLocationCreate {
    pub driver_profile_id: i64,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub is_online: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DriverLocationUpdate {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub is_online: Option<bool>,
}

impl Record for DriverLocation {
    const TABLE: &'static TableSpec = &tables::DRIVER_LOCATIONS;
    type Create = DriverLocationCreate;
    type Update = DriverLocationUpdate;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverDocument {
    pub id: i64,
    pub driver_profile_id: i64,
    pub doc_type: Option<String>,
    pub file_url: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverDocumentCreate {
    pub driver_profile_id: i64,
    #[validate(length(max = 50))]
    pub doc_type: Option<String>,
    pub file_url: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DriverDocumentUpdate {
    #[validate(length(max = 50))]
    pub doc_type: Option<String>,
    pub file_url: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub status: Option<String>,
}

impl Record for DriverDocument {
    const TABLE: &'static TableSpec = &tables::DRIVER_DOCUMENTS;
    type Create = DriverDocumentCreate;
    type Update = DriverDocumentUpdate;
}

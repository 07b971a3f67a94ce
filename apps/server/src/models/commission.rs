use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

/// Platform fee applied to rides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub name: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub percentage: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub fixed_amount: Option<Decimal>,
    pub is_active: bool,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// Older clients send `percent`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommissionCreate {
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[serde(default, alias = "percent", with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::percentage"))]
    pub percentage: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub fixed_amount: Option<Decimal>,
    pub is_active: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommissionUpdate {
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[serde(default, alias = "percent", with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::percentage"))]
    pub percentage: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub fixed_amount: Option<Decimal>,
    pub is_active: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Record for Commission {
    const TABLE: &'static TableSpec = &tables::COMMISSIONS;
    type Create = CommissionCreate;
    type Update = CommissionUpdate;
}

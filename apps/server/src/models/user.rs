use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

/// A platform user, identified externally by their Telegram id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub telegram_id: i64,
    pub inviter_id: Option<i64>,
    pub first_name: Option<String>,
    pub username: Option<String>,
    pub lang_code: Option<String>,
    pub avatar_url: Option<String>,
    pub user_phone_number: Option<String>,
    pub is_active: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub balance_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Body of the get-or-create call. `telegram_id` may come from the path instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserCreate {
    pub telegram_id: Option<i64>,
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub username: Option<String>,
    pub inviter_id: Option<i64>,
    #[validate(length(max = 5))]
    pub lang_code: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(length(max = 20))]
    pub user_phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,
    #[validate(length(max = 100))]
    pub username: Option<String>,
    pub inviter_id: Option<i64>,
    #[validate(length(max = 5))]
    pub lang_code: Option<String>,
    pub avatar_url: Option<String>,
    #[validate(length(max = 20))]
    pub user_phone_number: Option<String>,
    pub is_active: Option<bool>,
    pub last_active_at: Option<DateTime<Utc>>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::non_negative"))]
    pub balance: Option<Decimal>,
}

impl Record for User {
    const TABLE: &'static TableSpec = &tables::USERS;
    type Create = UserCreate;
    type Update = UserUpdate;
}

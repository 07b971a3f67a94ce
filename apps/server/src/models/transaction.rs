use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

/// A balance movement. Withdrawals count negative when balances are refreshed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub is_withdraw: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub ride_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionCreate {
    pub user_id: i64,
    pub is_withdraw: Option<bool>,
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom(function = "super::positive"))]
    pub amount: Decimal,
    pub ride_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TransactionUpdate {
    pub is_withdraw: Option<bool>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[validate(custom(function = "super::positive"))]
    pub amount: Option<Decimal>,
    pub ride_id: Option<i64>,
}

impl Record for Transaction {
    const TABLE: &'static TableSpec = &tables::TRANSACTIONS;
    type Create = TransactionCreate;
    type Update = TransactionUpdate;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Record;
use crate::db::{tables, TableSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoneVerification {
    pub id: i64,
    pub user_id: i64,
    pub phone: Option<String>,
    pub code: Option<String>,
    pub attempts: i64,
    pub is_verified: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhoneVerificationCreate {
    pub user_id: i64,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 10))]
    pub code: Option<String>,
    #[validate(range(min = 0))]
    pub attempts: Option<i64>,
    pub is_verified: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PhoneVerificationUpdate {
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 10))]
    pub code: Option<String>,
    #[validate(range(min = 0))]
    pub attempts: Option<i64>,
    pub is_verified: Option<bool>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Record for PhoneVerification {
    const TABLE: &'static TableSpec = &tables::PHONE_VERIFICATIONS;
    type Create = PhoneVerificationCreate;
    type Update = PhoneVerificationUpdate;
}

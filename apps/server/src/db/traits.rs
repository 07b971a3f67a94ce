use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::schema::{JsonMap, ListQuery, TableSpec};
use crate::Result;

/// A checked status change on one ride.
#[derive(Debug, Clone)]
pub struct RideTransition {
    /// Statuses the ride must currently be in for the change to apply.
    pub allowed_from: Vec<String>,
    /// Column values written to the ride row.
    pub changes: JsonMap,
    /// History row written alongside. `ride_id` and `from_status` are filled in
    /// by the store from the locked row.
    pub history: JsonMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    NotFound,
    Rejected { current: String },
    Applied(JsonValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceRefresh {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance_increase: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// Row storage over JSON objects.
///
/// Every row is returned as a JSON object holding all columns of its table.
/// Column names in `values` and filters that the table does not declare are
/// ignored, so implementations never splice unknown identifiers into queries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Check that the backing storage answers.
    async fn ping(&self) -> Result<()>;

    async fn list(&self, table: &'static TableSpec, query: &ListQuery) -> Result<Vec<JsonValue>>;

    async fn count(&self, table: &'static TableSpec, filters: &[(String, JsonValue)])
        -> Result<i64>;

    async fn get(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>>;

    /// Insert a row. Null values are dropped so column defaults apply.
    async fn insert(&self, table: &'static TableSpec, values: JsonMap) -> Result<JsonValue>;

    /// Change the supplied non-null columns. Returns `None` for an unknown id.
    async fn update(
        &self,
        table: &'static TableSpec,
        id: i64,
        values: JsonMap,
    ) -> Result<Option<JsonValue>>;

    /// Remove a row, returning it. Returns `None` for an unknown id.
    async fn delete(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>>;

    /// Insert a ride together with its first history row.
    async fn insert_ride(&self, values: JsonMap, initial_history: JsonMap) -> Result<JsonValue>;

    async fn transition_ride(
        &self,
        ride_id: i64,
        transition: &RideTransition,
    ) -> Result<TransitionOutcome>;

    /// Fold the user's transactions since the last refresh into the balance.
    async fn refresh_balance(&self, user_id: i64) -> Result<Option<BalanceRefresh>>;
}

//! In-process `RecordStore` implementation.
//!
//! Primary use-case: integration tests and local runs without PostgreSQL.
//! It applies the same column defaults and enforces the same unique and
//! foreign-key rules as the migrations, so handlers observe identical status
//! codes on either backend.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::schema::{json_cmp, json_eq, ColumnKind, JsonMap, ListQuery, TableSpec};
use super::tables::{self, RIDES, RIDE_STATUS_HISTORY, TRANSACTIONS, USERS};
use super::traits::{BalanceRefresh, RecordStore, RideTransition, TransitionOutcome};
use crate::{Error, Result};

#[derive(Default)]
struct MemoryTable {
    next_id: i64,
    rows: BTreeMap<i64, JsonMap>,
}

struct State {
    tables: HashMap<&'static str, MemoryTable>,
    last_now: DateTime<Utc>,
}

impl State {
    /// Strictly increasing clock so "created after" comparisons never tie.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.last_now + Duration::microseconds(1));
        self.last_now = now;
        now
    }

    fn table(&self, table: &TableSpec) -> Option<&MemoryTable> {
        self.tables.get(table.name)
    }

    fn table_mut(&mut self, table: &'static TableSpec) -> &mut MemoryTable {
        self.tables.entry(table.name).or_default()
    }

    fn contains(&self, table_name: &str, id: i64) -> bool {
        self.tables
            .get(table_name)
            .is_some_and(|t| t.rows.contains_key(&id))
    }

    fn insert(&mut self, table: &'static TableSpec, values: JsonMap) -> Result<JsonMap> {
        let values = known_values(table, values)?;
        let now = timestamp(self.now());

        let mut row = JsonMap::new();
        for column in table.columns {
            if column.name == "id" {
                continue;
            }
            let value = values
                .get(column.name)
                .cloned()
                .unwrap_or_else(|| column.default.value(&now));
            row.insert(column.name.to_string(), value);
        }

        self.check_unique(table, &row, None)?;
        self.check_references(table, &row)?;

        let storage = self.table_mut(table);
        storage.next_id += 1;
        let id = storage.next_id;
        row.insert("id".to_string(), JsonValue::from(id));
        storage.rows.insert(id, row.clone());
        Ok(row)
    }

    fn update(
        &mut self,
        table: &'static TableSpec,
        id: i64,
        values: JsonMap,
    ) -> Result<Option<JsonMap>> {
        let values = known_values(table, values)?;
        let Some(mut row) = self.table(table).and_then(|t| t.rows.get(&id)).cloned() else {
            return Ok(None);
        };
        if values.is_empty() {
            return Ok(Some(row));
        }

        for (column, value) in values {
            row.insert(column, value);
        }
        if table.touches_updated_at() {
            let now = timestamp(self.now());
            row.insert("updated_at".to_string(), now);
        }

        self.check_unique(table, &row, Some(id))?;
        self.check_references(table, &row)?;

        self.table_mut(table).rows.insert(id, row.clone());
        Ok(Some(row))
    }

    fn delete(&mut self, table: &'static TableSpec, id: i64) -> Result<Option<JsonMap>> {
        if !self.contains(table.name, id) {
            return Ok(None);
        }

        let mut cascaded: Vec<(&'static TableSpec, i64)> = Vec::new();
        for (child, fk) in tables::referencing(table.name) {
            let Some(storage) = self.table(child) else {
                continue;
            };
            let dependents = storage.rows.iter().filter(|(_, row)| {
                row.get(fk.column).and_then(JsonValue::as_i64) == Some(id)
            });
            if fk.cascade {
                cascaded.extend(dependents.map(|(child_id, _)| (child, *child_id)));
            } else if dependents.count() > 0 {
                return Err(table.still_referenced(id, child.name));
            }
        }

        for (child, child_id) in cascaded {
            self.table_mut(child).rows.remove(&child_id);
        }
        Ok(self.table_mut(table).rows.remove(&id))
    }

    fn check_unique(&self, table: &TableSpec, row: &JsonMap, exclude: Option<i64>) -> Result<()> {
        let Some(storage) = self.table(table) else {
            return Ok(());
        };
        for column in table.unique {
            let Some(value) = row.get(*column).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = storage.rows.iter().any(|(id, other)| {
                Some(*id) != exclude && other.get(*column).is_some_and(|v| json_eq(v, value))
            });
            if taken {
                return Err(table.duplicate(Some(*column)));
            }
        }
        Ok(())
    }

    fn check_references(&self, table: &TableSpec, row: &JsonMap) -> Result<()> {
        for fk in table.foreign_keys {
            let Some(value) = row.get(fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = value
                .as_i64()
                .is_some_and(|id| self.contains(fk.references, id));
            if !exists {
                return Err(table.missing_reference(fk.column));
            }
        }
        Ok(())
    }
}

/// Mutex-guarded tables living in the process.
pub struct MemoryRecordStore {
    state: Mutex<State>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tables: HashMap::new(),
                last_now: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn list(&self, table: &'static TableSpec, query: &ListQuery) -> Result<Vec<JsonValue>> {
        let state = self.lock()?;
        let Some(storage) = state.table(table) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&JsonMap> = storage
            .rows
            .values()
            .filter(|row| matches(table, row, &query.filters))
            .collect();

        if let Some(column) = query.sort_by.as_deref().filter(|c| table.has_column(c)) {
            // BTreeMap iteration already yields ascending ids; a stable sort keeps that as
            // the tie-breaker.
            rows.sort_by(|a, b| {
                let ordering = json_cmp(
                    a.get(column).unwrap_or(&JsonValue::Null),
                    b.get(column).unwrap_or(&JsonValue::Null),
                );
                if query.sort_desc {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        } else if query.sort_desc {
            rows.reverse();
        }

        Ok(rows
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(usize::MAX))
            .take(query.page_size as usize)
            .map(|row| JsonValue::Object(row.clone()))
            .collect())
    }

    async fn count(
        &self,
        table: &'static TableSpec,
        filters: &[(String, JsonValue)],
    ) -> Result<i64> {
        let state = self.lock()?;
        let count = state.table(table).map_or(0, |storage| {
            storage
                .rows
                .values()
                .filter(|row| matches(table, row, filters))
                .count()
        });
        Ok(count as i64)
    }

    async fn get(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>> {
        let state = self.lock()?;
        Ok(state
            .table(table)
            .and_then(|t| t.rows.get(&id))
            .map(|row| JsonValue::Object(row.clone())))
    }

    async fn insert(&self, table: &'static TableSpec, values: JsonMap) -> Result<JsonValue> {
        let mut state = self.lock()?;
        state.insert(table, values).map(JsonValue::Object)
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        id: i64,
        values: JsonMap,
    ) -> Result<Option<JsonValue>> {
        let mut state = self.lock()?;
        Ok(state.update(table, id, values)?.map(JsonValue::Object))
    }

    async fn delete(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>> {
        let mut state = self.lock()?;
        Ok(state.delete(table, id)?.map(JsonValue::Object))
    }

    async fn insert_ride(&self, values: JsonMap, initial_history: JsonMap) -> Result<JsonValue> {
        let mut state = self.lock()?;
        let ride = state.insert(&RIDES, values)?;
        let ride_id = ride
            .get("id")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| Error::Internal("inserted ride has no id".to_string()))?;

        let mut history = initial_history;
        history.insert("ride_id".to_string(), JsonValue::from(ride_id));
        if let Err(e) = state.insert(&RIDE_STATUS_HISTORY, history) {
            state.table_mut(&RIDES).rows.remove(&ride_id);
            return Err(e);
        }
        Ok(JsonValue::Object(ride))
    }

    async fn transition_ride(
        &self,
        ride_id: i64,
        transition: &RideTransition,
    ) -> Result<TransitionOutcome> {
        let mut state = self.lock()?;
        let Some(before) = state.table(&RIDES).and_then(|t| t.rows.get(&ride_id)).cloned() else {
            return Ok(TransitionOutcome::NotFound);
        };
        let current = before
            .get("status")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        if !transition.allowed_from.iter().any(|s| *s == current) {
            return Ok(TransitionOutcome::Rejected { current });
        }

        let mut ride = state
            .update(&RIDES, ride_id, transition.changes.clone())?
            .ok_or_else(|| Error::Internal(format!("ride {ride_id} vanished")))?;
        // `update` skips nulls; a transition uses them to clear columns.
        let cleared: Vec<&String> = transition
            .changes
            .iter()
            .filter(|(column, value)| value.is_null() && RIDES.has_column(column))
            .map(|(column, _)| column)
            .collect();
        if !cleared.is_empty() {
            for column in cleared {
                ride.insert(column.clone(), JsonValue::Null);
            }
            state.table_mut(&RIDES).rows.insert(ride_id, ride.clone());
        }

        let mut history = transition.history.clone();
        history.insert("ride_id".to_string(), JsonValue::from(ride_id));
        history.insert("from_status".to_string(), JsonValue::String(current));
        if let Err(e) = state.insert(&RIDE_STATUS_HISTORY, history) {
            state.table_mut(&RIDES).rows.insert(ride_id, before);
            return Err(e);
        }
        Ok(TransitionOutcome::Applied(JsonValue::Object(ride)))
    }

    async fn refresh_balance(&self, user_id: i64) -> Result<Option<BalanceRefresh>> {
        let mut state = self.lock()?;
        let Some(user) = state.table(&USERS).and_then(|t| t.rows.get(&user_id)).cloned() else {
            return Ok(None);
        };
        let since = user.get("balance_updated_at").and_then(parse_timestamp);

        let balance_increase: Decimal = state
            .table(&TRANSACTIONS)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|tx| tx.get("user_id").and_then(JsonValue::as_i64) == Some(user_id))
                    .filter(|tx| match since {
                        None => true,
                        Some(since) => tx
                            .get("created_at")
                            .and_then(parse_timestamp)
                            .is_some_and(|created| created > since),
                    })
                    .map(|tx| {
                        let amount = decimal(tx.get("amount"));
                        if tx.get("is_withdraw").and_then(JsonValue::as_bool) == Some(true) {
                            -amount
                        } else {
                            amount
                        }
                    })
                    .sum()
            })
            .unwrap_or_default();

        let new_balance = (decimal(user.get("balance")) + balance_increase).round_dp(2);
        if new_balance.is_sign_negative() && !new_balance.is_zero() {
            return Err(Error::Validation(format!(
                "Balance of user {user_id} cannot become negative"
            )));
        }

        let now = timestamp(state.now());
        let mut updated = user;
        updated.insert(
            "balance".to_string(),
            new_balance
                .to_f64()
                .map(JsonValue::from)
                .unwrap_or(JsonValue::Null),
        );
        updated.insert("balance_updated_at".to_string(), now);
        state.table_mut(&USERS).rows.insert(user_id, updated);

        Ok(Some(BalanceRefresh {
            balance_increase,
            new_balance,
        }))
    }
}

fn timestamp(at: DateTime<Utc>) -> JsonValue {
    JsonValue::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn parse_timestamp(value: &JsonValue) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn decimal(value: Option<&JsonValue>) -> Decimal {
    value
        .and_then(JsonValue::as_f64)
        .and_then(Decimal::from_f64)
        .unwrap_or_default()
}

fn matches(table: &TableSpec, row: &JsonMap, filters: &[(String, JsonValue)]) -> bool {
    filters
        .iter()
        .filter(|(column, _)| table.has_column(column))
        .all(|(column, expected)| row.get(column).is_some_and(|v| json_eq(v, expected)))
}

/// Same filtering as the SQL store plus the type checks PostgreSQL would do
/// while coercing the payload.
fn known_values(table: &TableSpec, values: JsonMap) -> Result<JsonMap> {
    let mut kept = JsonMap::new();
    for (name, value) in values {
        if name == "id" || value.is_null() {
            continue;
        }
        let Some(column) = table.column(&name) else {
            continue;
        };
        let valid = match column.kind {
            ColumnKind::BigInt => value.is_i64(),
            ColumnKind::Text => value.is_string(),
            ColumnKind::Bool => value.is_boolean(),
            ColumnKind::Decimal | ColumnKind::Float => value.is_number(),
            ColumnKind::Timestamp => parse_timestamp(&value).is_some(),
            ColumnKind::Json => true,
        };
        if !valid {
            return Err(Error::Validation(format!(
                "Invalid value for {}.{}",
                table.name, column.name
            )));
        }
        kept.insert(name, value);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tables::{DRIVER_LOCATIONS, DRIVER_PROFILES, ROLES};
    use serde_json::json;

    fn map(value: JsonValue) -> JsonMap {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    async fn user(store: &MemoryRecordStore, telegram_id: i64) -> i64 {
        store
            .insert(&USERS, map(json!({ "telegram_id": telegram_id })))
            .await
            .unwrap()["id"]
            .as_i64()
            .unwrap()
    }

    #[tokio::test]
    async fn insert_applies_column_defaults() {
        let store = MemoryRecordStore::new();
        let row = store
            .insert(&USERS, map(json!({ "telegram_id": 1, "lang_code": null })))
            .await
            .unwrap();
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["balance"], json!(400));
        assert_eq!(row["lang_code"], json!("EN"));
        assert_eq!(row["is_active"], json!(true));
        assert!(row["created_at"].is_string());
        assert!(row["username"].is_null());
    }

    #[tokio::test]
    async fn unique_columns_reject_duplicates() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 10).await;
        store
            .insert(&DRIVER_PROFILES, map(json!({ "user_id": user_id })))
            .await
            .unwrap();
        let err = store
            .insert(&DRIVER_PROFILES, map(json!({ "user_id": user_id })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "{err:?}");
    }

    #[tokio::test]
    async fn foreign_keys_must_resolve() {
        let store = MemoryRecordStore::new();
        let err = store
            .insert(
                &DRIVER_LOCATIONS,
                map(json!({ "driver_profile_id": 99999, "latitude": 1.0, "longitude": 2.0 })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ForeignKeyViolation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn delete_refuses_referenced_rows_and_cascades_history() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 20).await;

        let ride = store
            .insert_ride(
                map(json!({ "client_id": user_id })),
                map(json!({ "to_status": "requested", "actor_role": "client" })),
            )
            .await
            .unwrap();
        let ride_id = ride["id"].as_i64().unwrap();

        let err = store.delete(&USERS, user_id).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "{err:?}");

        let history = ListQuery::new(1, 10).filter("ride_id", json!(ride_id));
        assert_eq!(store.list(&RIDE_STATUS_HISTORY, &history).await.unwrap().len(), 1);

        assert!(store.delete(&RIDES, ride_id).await.unwrap().is_some());
        assert!(store.list(&RIDE_STATUS_HISTORY, &history).await.unwrap().is_empty());
        assert!(store.delete(&USERS, user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_ignores_nulls_and_touches_updated_at() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 30).await;
        let profile = store
            .insert(
                &DRIVER_PROFILES,
                map(json!({ "user_id": user_id, "car_make": "Lada" })),
            )
            .await
            .unwrap();
        let id = profile["id"].as_i64().unwrap();

        let updated = store
            .update(
                &DRIVER_PROFILES,
                id,
                map(json!({ "car_make": null, "car_model": "Vesta" })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["car_make"], json!("Lada"));
        assert_eq!(updated["car_model"], json!("Vesta"));
        assert_ne!(updated["updated_at"], profile["updated_at"]);

        assert!(store
            .update(&DRIVER_PROFILES, 999, map(json!({ "car_model": "x" })))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn rejects_mistyped_values() {
        let store = MemoryRecordStore::new();
        let err = store
            .insert(&USERS, map(json!({ "telegram_id": "not-a-number" })))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_sorts_and_paginates() {
        let store = MemoryRecordStore::new();
        for (code, name) in [("b", "Bravo"), ("a", "Alpha"), ("c", "Charlie")] {
            store
                .insert(&ROLES, map(json!({ "code": code, "name": name })))
                .await
                .unwrap();
        }

        let mut query = ListQuery::new(1, 2);
        query.sort_by = Some("code".to_string());
        let page = store.list(&ROLES, &query).await.unwrap();
        let codes: Vec<_> = page.iter().map(|r| r["code"].clone()).collect();
        assert_eq!(codes, vec![json!("a"), json!("b")]);

        query.page = 2;
        assert_eq!(store.list(&ROLES, &query).await.unwrap().len(), 1);

        let filtered = vec![("code".to_string(), json!("c"))];
        assert_eq!(store.count(&ROLES, &filtered).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn transition_checks_current_status() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 40).await;
        let ride = store
            .insert_ride(
                map(json!({ "client_id": user_id })),
                map(json!({ "to_status": "requested" })),
            )
            .await
            .unwrap();
        let ride_id = ride["id"].as_i64().unwrap();

        let transition = RideTransition {
            allowed_from: vec!["accepted".to_string()],
            changes: map(json!({ "status": "arrived" })),
            history: map(json!({ "to_status": "arrived" })),
        };
        assert_eq!(
            store.transition_ride(ride_id, &transition).await.unwrap(),
            TransitionOutcome::Rejected {
                current: "requested".to_string()
            }
        );
        assert_eq!(
            store.transition_ride(4242, &transition).await.unwrap(),
            TransitionOutcome::NotFound
        );

        let cancel = RideTransition {
            allowed_from: vec!["requested".to_string()],
            changes: map(json!({ "status": "canceled" })),
            history: map(json!({ "to_status": "canceled" })),
        };
        let TransitionOutcome::Applied(row) = store.transition_ride(ride_id, &cancel).await.unwrap()
        else {
            panic!("expected transition to apply");
        };
        assert_eq!(row["status"], json!("canceled"));

        let history = store
            .list(
                &RIDE_STATUS_HISTORY,
                &ListQuery::new(1, 10).filter("ride_id", json!(ride_id)),
            )
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["from_status"], json!("requested"));
    }

    #[tokio::test]
    async fn transition_null_clears_column() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 41).await;
        let ride = store
            .insert_ride(
                map(json!({ "client_id": user_id })),
                map(json!({ "to_status": "requested" })),
            )
            .await
            .unwrap();
        let ride_id = ride["id"].as_i64().unwrap();

        let assign = RideTransition {
            allowed_from: vec!["requested".to_string()],
            changes: map(json!({ "status": "driver_assigned", "status_reason": "driver found" })),
            history: map(json!({ "to_status": "driver_assigned" })),
        };
        store.transition_ride(ride_id, &assign).await.unwrap();

        let accept = RideTransition {
            allowed_from: vec!["driver_assigned".to_string()],
            changes: map(json!({ "status": "accepted", "status_reason": null })),
            history: map(json!({ "to_status": "accepted" })),
        };
        let TransitionOutcome::Applied(row) = store.transition_ride(ride_id, &accept).await.unwrap()
        else {
            panic!("expected transition to apply");
        };
        assert_eq!(row["status_reason"], JsonValue::Null);
        let stored = store.get(&RIDES, ride_id).await.unwrap().unwrap();
        assert_eq!(stored["status_reason"], JsonValue::Null);
    }

    #[tokio::test]
    async fn balance_refresh_folds_new_transactions_once() {
        let store = MemoryRecordStore::new();
        let user_id = user(&store, 50).await;
        for (amount, is_withdraw) in [(100.0, false), (30.5, true)] {
            store
                .insert(
                    &TRANSACTIONS,
                    map(json!({ "user_id": user_id, "amount": amount, "is_withdraw": is_withdraw })),
                )
                .await
                .unwrap();
        }

        let first = store.refresh_balance(user_id).await.unwrap().unwrap();
        assert_eq!(first.balance_increase, Decimal::new(695, 1));
        assert_eq!(first.new_balance, Decimal::new(4695, 1));

        let second = store.refresh_balance(user_id).await.unwrap().unwrap();
        assert_eq!(second.balance_increase, Decimal::ZERO);
        assert_eq!(second.new_balance, Decimal::new(4695, 1));

        assert!(store.refresh_balance(777).await.unwrap().is_none());
    }
}

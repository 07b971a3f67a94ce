//! PostgreSQL-backed `RecordStore` implementation
//!
//! Rows travel as JSONB: reads project them with `to_jsonb(t)` and writes feed
//! the payload through `jsonb_populate_record`, so PostgreSQL does the type
//! coercion for every column. Only column names declared in the table's
//! `TableSpec` ever reach the SQL text.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Row};

use super::schema::{JsonMap, ListQuery, TableSpec};
use super::tables::{RIDES, RIDE_STATUS_HISTORY, USERS};
use super::traits::{BalanceRefresh, RecordStore, RideTransition, TransitionOutcome};
use crate::{Error, Result};

/// PostgreSQL-backed RecordStore implementation
#[derive(Clone)]
pub struct PostgresRecordStore {
    pub(crate) pool: PgPool,
}

#[derive(Debug, Clone, Copy)]
enum WriteKind {
    Upsert,
    Delete { id: i64 },
}

impl PostgresRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_with<'e, E>(
        executor: E,
        table: &'static TableSpec,
        values: JsonMap,
    ) -> Result<JsonValue>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let values = known_values(table, values);
        let sql = insert_sql(table, &values);
        sqlx::query_scalar::<_, JsonValue>(&sql)
            .bind(JsonValue::Object(values))
            .fetch_one(executor)
            .await
            .map_err(|e| classify(table, e, WriteKind::Upsert))
    }

    async fn update_with<'e, E>(
        executor: E,
        table: &'static TableSpec,
        id: i64,
        values: JsonMap,
    ) -> Result<Option<JsonValue>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let sql = update_sql(table, &values);
        sqlx::query_scalar::<_, JsonValue>(&sql)
            .bind(id)
            .bind(JsonValue::Object(values))
            .fetch_optional(executor)
            .await
            .map_err(|e| classify(table, e, WriteKind::Upsert))
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Unavailable(format!("database unreachable: {e}")))?;
        Ok(())
    }

    async fn list(&self, table: &'static TableSpec, query: &ListQuery) -> Result<Vec<JsonValue>> {
        let filters = known_filters(table, &query.filters);
        let (where_clause, next) = where_sql(&filters);

        let order_column = query
            .sort_by
            .as_deref()
            .filter(|c| table.has_column(c))
            .unwrap_or("id");
        let direction = if query.sort_desc { "DESC" } else { "ASC" };

        let sql = format!(
            "SELECT to_jsonb(t) FROM {table} AS t{where_clause} \
             ORDER BY t.\"{order_column}\" {direction}, t.id ASC \
             LIMIT ${limit} OFFSET ${offset}",
            table = table.name,
            limit = next,
            offset = next + 1,
        );

        let mut q = sqlx::query_scalar::<_, JsonValue>(&sql);
        for (_, value) in &filters {
            q = q.bind(*value);
        }
        let rows = q
            .bind(i64::from(query.page_size))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows)
    }

    async fn count(
        &self,
        table: &'static TableSpec,
        filters: &[(String, JsonValue)],
    ) -> Result<i64> {
        let filters = known_filters(table, filters);
        let (where_clause, _) = where_sql(&filters);
        let sql = format!("SELECT COUNT(*) FROM {} AS t{}", table.name, where_clause);

        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for (_, value) in &filters {
            q = q.bind(*value);
        }
        q.fetch_one(&self.pool).await.map_err(Error::Database)
    }

    async fn get(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>> {
        let sql = format!("SELECT to_jsonb(t) FROM {} AS t WHERE t.id = $1", table.name);
        sqlx::query_scalar::<_, JsonValue>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn insert(&self, table: &'static TableSpec, values: JsonMap) -> Result<JsonValue> {
        Self::insert_with(&self.pool, table, values).await
    }

    async fn update(
        &self,
        table: &'static TableSpec,
        id: i64,
        values: JsonMap,
    ) -> Result<Option<JsonValue>> {
        let values = known_values(table, values);
        if values.is_empty() {
            return self.get(table, id).await;
        }
        Self::update_with(&self.pool, table, id, values).await
    }

    async fn delete(&self, table: &'static TableSpec, id: i64) -> Result<Option<JsonValue>> {
        let sql = format!(
            "DELETE FROM {} AS t WHERE t.id = $1 RETURNING to_jsonb(t)",
            table.name
        );
        sqlx::query_scalar::<_, JsonValue>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(table, e, WriteKind::Delete { id }))
    }

    async fn insert_ride(&self, values: JsonMap, initial_history: JsonMap) -> Result<JsonValue> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let ride = Self::insert_with(&mut *tx, &RIDES, values).await?;
        let ride_id = ride
            .get("id")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| Error::Internal("inserted ride has no id".to_string()))?;

        let mut history = initial_history;
        history.insert("ride_id".to_string(), JsonValue::from(ride_id));
        Self::insert_with(&mut *tx, &RIDE_STATUS_HISTORY, history).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(ride)
    }

    async fn transition_ride(
        &self,
        ride_id: i64,
        transition: &RideTransition,
    ) -> Result<TransitionOutcome> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock: concurrent transitions of one ride serialise here.
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM rides WHERE id = $1 FOR UPDATE")
                .bind(ride_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let Some(current) = current else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !transition.allowed_from.iter().any(|s| *s == current) {
            return Ok(TransitionOutcome::Rejected { current });
        }

        let changes = transition_values(transition.changes.clone());
        let ride = Self::update_with(&mut *tx, &RIDES, ride_id, changes)
            .await?
            .ok_or_else(|| Error::Internal(format!("locked ride {ride_id} vanished")))?;

        let mut history = transition.history.clone();
        history.insert("ride_id".to_string(), JsonValue::from(ride_id));
        history.insert("from_status".to_string(), JsonValue::String(current));
        Self::insert_with(&mut *tx, &RIDE_STATUS_HISTORY, history).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(TransitionOutcome::Applied(ride))
    }

    async fn refresh_balance(&self, user_id: i64) -> Result<Option<BalanceRefresh>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query("SELECT balance_updated_at FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let since: Option<DateTime<Utc>> =
            row.try_get("balance_updated_at").map_err(Error::Database)?;

        let balance_increase: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(CASE WHEN is_withdraw THEN -amount ELSE amount END), 0)
             FROM transactions
             WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at > $2)",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let new_balance: Decimal = sqlx::query_scalar(
            "UPDATE users
             SET balance = balance + $2, balance_updated_at = NOW()
             WHERE id = $1
             RETURNING balance",
        )
        .bind(user_id)
        .bind(balance_increase)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| classify(&USERS, e, WriteKind::Upsert))?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(Some(BalanceRefresh {
            balance_increase,
            new_balance,
        }))
    }
}

/// Drop unknown columns, the primary key and nulls.
fn known_values(table: &TableSpec, values: JsonMap) -> JsonMap {
    values
        .into_iter()
        .filter(|(k, v)| k != "id" && !v.is_null() && table.has_column(k))
        .collect()
}

/// Ride columns set by a transition. Nulls are kept so they clear the column.
fn transition_values(values: JsonMap) -> JsonMap {
    values
        .into_iter()
        .filter(|(k, _)| k != "id" && RIDES.has_column(k))
        .collect()
}

fn known_filters<'a>(
    table: &TableSpec,
    filters: &'a [(String, JsonValue)],
) -> Vec<(&'a str, &'a JsonValue)> {
    filters
        .iter()
        .filter(|(column, _)| table.has_column(column))
        .map(|(column, value)| (column.as_str(), value))
        .collect()
}

/// Returns the WHERE clause and the next free placeholder number.
fn where_sql(filters: &[(&str, &JsonValue)]) -> (String, usize) {
    if filters.is_empty() {
        return (String::new(), 1);
    }
    let conditions: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("to_jsonb(t.\"{}\") = ${}::jsonb", column, i + 1))
        .collect();
    (
        format!(" WHERE {}", conditions.join(" AND ")),
        filters.len() + 1,
    )
}

fn insert_sql(table: &TableSpec, values: &JsonMap) -> String {
    if values.is_empty() {
        return format!(
            "INSERT INTO {} AS t DEFAULT VALUES RETURNING to_jsonb(t)",
            table.name
        );
    }
    let columns = values
        .keys()
        .map(|k| format!("\"{k}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {t} AS t ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{t}, $1) \
         RETURNING to_jsonb(t)",
        t = table.name,
    )
}

fn update_sql(table: &TableSpec, values: &JsonMap) -> String {
    let mut assignments: Vec<String> = values
        .keys()
        .filter(|k| k.as_str() != "updated_at")
        .map(|k| format!("\"{k}\" = r.\"{k}\""))
        .collect();
    if table.touches_updated_at() {
        assignments.push("updated_at = NOW()".to_string());
    }
    format!(
        "UPDATE {t} AS t SET {assignments} \
         FROM jsonb_populate_record(NULL::{t}, $2) AS r \
         WHERE t.id = $1 \
         RETURNING to_jsonb(t)",
        t = table.name,
        assignments = assignments.join(", "),
    )
}

/// Map constraint violations onto the API error legend.
fn classify(table: &'static TableSpec, err: sqlx::Error, kind: WriteKind) -> Error {
    let classified = err.as_database_error().and_then(|db| {
        let code = db.code()?;
        match &*code {
            "23505" => {
                let column = db
                    .constraint()
                    .and_then(|c| table.unique.iter().find(|u| c.contains(*u)))
                    .copied();
                Some(table.duplicate(column))
            }
            "23503" => Some(match kind {
                WriteKind::Delete { id } => {
                    table.still_referenced(id, db.table().unwrap_or("another record"))
                }
                WriteKind::Upsert => {
                    // PostgreSQL names inline references `<table>_<column>_fkey`.
                    let column = db.constraint().and_then(|c| {
                        table
                            .foreign_keys
                            .iter()
                            .find(|fk| c == format!("{}_{}_fkey", table.name, fk.column))
                    });
                    match column {
                        Some(fk) => table.missing_reference(fk.column),
                        None => Error::ForeignKeyViolation(format!(
                            "{} references a record that does not exist",
                            table.resource
                        )),
                    }
                }
            }),
            "23502" | "23514" | "22001" | "22003" | "22007" | "22008" | "22P02" => {
                Some(Error::Validation(db.message().to_string()))
            }
            _ => None,
        }
    });
    classified.unwrap_or(Error::Database(err))
}

//! CRUD service - generic record operations
//!
//! One instance serves every record type; the `Record` impl selects the
//! table and the payload types.

use crate::{
    db::{ListQuery, RecordStore},
    models::{from_row, to_values, Record},
    Error, Result,
};
use serde_json::Value as JsonValue;
use std::marker::PhantomData;
use std::sync::Arc;
use validator::Validate;

pub struct CrudService<R> {
    store: Arc<dyn RecordStore>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for CrudService<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> CrudService<R> {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    fn not_found(id: i64) -> Error {
        Error::RecordNotFound {
            resource: R::TABLE.resource,
            id,
        }
    }

    pub async fn list(&self, query: &ListQuery) -> Result<Vec<R>> {
        self.store
            .list(R::TABLE, query)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    pub async fn count(&self, filters: &[(String, JsonValue)]) -> Result<i64> {
        self.store.count(R::TABLE, filters).await
    }

    pub async fn get(&self, id: i64) -> Result<R> {
        let row = self
            .store
            .get(R::TABLE, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        from_row(row)
    }

    pub async fn create(&self, payload: R::Create) -> Result<R> {
        payload.validate()?;
        let values = R::TABLE.writable_values(to_values(&payload)?);
        let row = self.store.insert(R::TABLE, values).await?;

        tracing::debug!(
            table = R::TABLE.name,
            id = row.get("id").and_then(JsonValue::as_i64),
            "Record created"
        );
        from_row(row)
    }

    /// Apply the supplied fields. An update without fields returns the record
    /// unchanged.
    pub async fn update(&self, id: i64, payload: R::Update) -> Result<R> {
        payload.validate()?;
        let values = R::TABLE.writable_values(to_values(&payload)?);
        let row = self
            .store
            .update(R::TABLE, id, values)
            .await?
            .ok_or_else(|| Self::not_found(id))?;
        from_row(row)
    }

    pub async fn delete(&self, id: i64) -> Result<R> {
        let row = self
            .store
            .delete(R::TABLE, id)
            .await?
            .ok_or_else(|| Self::not_found(id))?;

        tracing::debug!(table = R::TABLE.name, id, "Record deleted");
        from_row(row)
    }
}

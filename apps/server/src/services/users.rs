//! User-specific operations: get-or-create by Telegram id and balance refresh

use crate::{
    db::{tables::USERS, BalanceRefresh, ListQuery, RecordStore},
    models::{from_row, to_values, User, UserCreate},
    Error, Result,
};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn RecordStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_telegram_id(&self, telegram_id: i64) -> Result<Option<User>> {
        let query = ListQuery::new(1, 1).filter("telegram_id", JsonValue::from(telegram_id));
        self.store
            .list(&USERS, &query)
            .await?
            .into_iter()
            .next()
            .map(from_row)
            .transpose()
    }

    /// Return the user with this Telegram id, creating it from `payload` when
    /// unknown. An existing user is returned unchanged.
    ///
    /// Returns the user and whether it was created by this call.
    pub async fn get_or_create(&self, telegram_id: i64, payload: UserCreate) -> Result<(User, bool)> {
        payload.validate()?;
        if let Some(body_id) = payload.telegram_id {
            if body_id != telegram_id {
                return Err(Error::Validation(format!(
                    "telegram_id in body ({body_id}) does not match path ({telegram_id})"
                )));
            }
        }

        if let Some(user) = self.find_by_telegram_id(telegram_id).await? {
            return Ok((user, false));
        }

        let mut values = USERS.writable_values(to_values(&payload)?);
        values.insert("telegram_id".to_string(), JsonValue::from(telegram_id));

        match self.store.insert(&USERS, values).await {
            Ok(row) => {
                let user: User = from_row(row)?;
                tracing::info!(user_id = user.id, telegram_id, "User created");
                Ok((user, true))
            }
            // Lost a race with a concurrent creation of the same user.
            Err(Error::Conflict(detail)) => match self.find_by_telegram_id(telegram_id).await? {
                Some(user) => Ok((user, false)),
                None => Err(Error::Conflict(detail)),
            },
            Err(e) => Err(e),
        }
    }

    /// Fold transactions made since the last refresh into the user's balance.
    pub async fn refresh_balance(&self, user_id: i64) -> Result<BalanceRefresh> {
        let refresh = self
            .store
            .refresh_balance(user_id)
            .await?
            .ok_or(Error::RecordNotFound {
                resource: USERS.resource,
                id: user_id,
            })?;

        tracing::info!(
            user_id,
            balance_increase = %refresh.balance_increase,
            new_balance = %refresh.new_balance,
            "Balance refreshed"
        );
        Ok(refresh)
    }
}

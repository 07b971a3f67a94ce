//! Typed records and their create/update payloads

mod commission;
mod driver;
mod phone_verification;
mod ride;
mod role;
mod transaction;
mod user;

pub use commission::{Commission, CommissionCreate, CommissionUpdate};
pub use driver::{
    DriverDocument, DriverDocumentCreate, DriverDocumentUpdate, DriverLocation,
    DriverLocationCreate, DriverLocationUpdate, DriverProfile, DriverProfileCreate,
    DriverProfileUpdate,
};
pub use phone_verification::{PhoneVerification, PhoneVerificationCreate, PhoneVerificationUpdate};
pub use ride::{
    ActorRole, Ride, RideCreate, RideStatus, RideStatusChangeRequest, RideStatusHistory,
    RideUpdate,
};
pub use role::{Role, RoleCreate, RoleUpdate};
pub use transaction::{Transaction, TransactionCreate, TransactionUpdate};
pub use user::{User, UserCreate, UserUpdate};

use crate::db::{JsonMap, TableSpec};
use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

/// A record type stored in one table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: &'static TableSpec;

    type Create: Validate + Serialize + DeserializeOwned + Send + 'static;
    type Update: Validate + Serialize + DeserializeOwned + Send + 'static;
}

/// Serialize a payload into column values.
pub fn to_values<T: Serialize>(payload: &T) -> Result<JsonMap> {
    match serde_json::to_value(payload)? {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::Internal(format!(
            "payload serialized to a non-object: {other}"
        ))),
    }
}

/// Deserialize a store row into its record type.
pub fn from_row<R: DeserializeOwned>(row: JsonValue) -> Result<R> {
    Ok(serde_json::from_value(row)?)
}

pub(crate) fn non_negative(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("must_be_non_negative"));
    }
    Ok(())
}

pub(crate) fn positive(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if value.is_sign_negative() || value.is_zero() {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

pub(crate) fn percentage(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("must_be_between_0_and_100"));
    }
    Ok(())
}

pub(crate) fn rating(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if *value < Decimal::ZERO || *value > Decimal::from(5) {
        return Err(ValidationError::new("must_be_between_0_and_5"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_checks() {
        assert!(non_negative(&Decimal::ZERO).is_ok());
        assert!(non_negative(&Decimal::NEGATIVE_ONE).is_err());
        assert!(positive(&Decimal::ZERO).is_err());
        assert!(positive(&Decimal::new(1, 2)).is_ok());
        assert!(percentage(&Decimal::new(1005, 1)).is_err());
        assert!(percentage(&Decimal::new(155, 1)).is_ok());
        assert!(rating(&Decimal::new(51, 1)).is_err());
    }
}

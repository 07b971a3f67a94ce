//! Table descriptions. Must stay in sync with `migrations/`.

use super::schema::{
    Column, ColumnDefault as D, ColumnKind as K, ForeignKey, TableSpec,
};

const ID: Column = Column::new("id", K::BigInt).read_only().filterable();
const CREATED_AT: Column = Column::new("created_at", K::Timestamp)
    .read_only()
    .with_default(D::Now);
const UPDATED_AT: Column = Column::new("updated_at", K::Timestamp)
    .read_only()
    .with_default(D::Now);

pub static USERS: TableSpec = TableSpec {
    name: "users",
    resource: "User",
    columns: &[
        ID,
        Column::new("telegram_id", K::BigInt).filterable(),
        Column::new("inviter_id", K::BigInt).filterable(),
        CREATED_AT,
        Column::new("last_active_at", K::Timestamp).with_default(D::Now),
        Column::new("balance", K::Decimal).with_default(D::Int(400)),
        Column::new("balance_updated_at", K::Timestamp)
            .read_only()
            .with_default(D::Now),
        Column::new("first_name", K::Text),
        Column::new("username", K::Text).filterable(),
        Column::new("lang_code", K::Text).with_default(D::Text("EN")),
        Column::new("avatar_url", K::Text),
        Column::new("user_phone_number", K::Text),
        Column::new("is_active", K::Bool)
            .filterable()
            .with_default(D::Bool(true)),
    ],
    foreign_keys: &[],
    unique: &["telegram_id"],
};

pub static ROLES: TableSpec = TableSpec {
    name: "roles",
    resource: "Role",
    columns: &[
        ID,
        Column::new("code", K::Text).filterable(),
        Column::new("name", K::Text),
        Column::new("description", K::Text),
        CREATED_AT,
    ],
    foreign_keys: &[],
    unique: &["code"],
};

pub static DRIVER_PROFILES: TableSpec = TableSpec {
    name: "driver_profiles",
    resource: "DriverProfile",
    columns: &[
        ID,
        Column::new("user_id", K::BigInt).filterable(),
        Column::new("license_number", K::Text),
        Column::new("car_make", K::Text),
        Column::new("car_model", K::Text),
        Column::new("car_color", K::Text),
        Column::new("car_plate", K::Text),
        Column::new("approved", K::Bool)
            .filterable()
            .with_default(D::Bool(false)),
        Column::new("rating", K::Decimal),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "user_id",
        references: "users",
        cascade: false,
    }],
    unique: &["user_id"],
};

pub static DRIVER_LOCATIONS: TableSpec = TableSpec {
    name: "driver_locations",
    resource: "DriverLocation",
    columns: &[
        ID,
        Column::new("driver_profile_id", K::BigInt).filterable(),
        Column::new("latitude", K::Float),
        Column::new("longitude", K::Float),
        Column::new("is_online", K::Bool)
            .filterable()
            .with_default(D::Bool(false)),
        UPDATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "driver_profile_id",
        references: "driver_profiles",
        cascade: false,
    }],
    unique: &[],
};

pub static DRIVER_DOCUMENTS: TableSpec = TableSpec {
    name: "driver_documents",
    resource: "DriverDocument",
    columns: &[
        ID,
        Column::new("driver_profile_id", K::BigInt).filterable(),
        Column::new("doc_type", K::Text).filterable(),
        Column::new("file_url", K::Text),
        Column::new("status", K::Text)
            .filterable()
            .with_default(D::Text("pending")),
        CREATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "driver_profile_id",
        references: "driver_profiles",
        cascade: false,
    }],
    unique: &[],
};

pub static COMMISSIONS: TableSpec = TableSpec {
    name: "commissions",
    resource: "Commission",
    columns: &[
        ID,
        Column::new("name", K::Text).filterable(),
        Column::new("percentage", K::Decimal).with_default(D::Int(0)),
        Column::new("fixed_amount", K::Decimal),
        Column::new("is_active", K::Bool)
            .filterable()
            .with_default(D::Bool(true)),
        Column::new("valid_from", K::Timestamp),
        Column::new("valid_to", K::Timestamp),
        CREATED_AT,
    ],
    foreign_keys: &[],
    unique: &[],
};

pub static PHONE_VERIFICATIONS: TableSpec = TableSpec {
    name: "phone_verifications",
    resource: "PhoneVerification",
    columns: &[
        ID,
        Column::new("user_id", K::BigInt).filterable(),
        Column::new("phone", K::Text).filterable(),
        Column::new("code", K::Text),
        Column::new("attempts", K::BigInt).with_default(D::Int(0)),
        Column::new("is_verified", K::Bool)
            .filterable()
            .with_default(D::Bool(false)),
        Column::new("expires_at", K::Timestamp),
        CREATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "user_id",
        references: "users",
        cascade: false,
    }],
    unique: &[],
};

pub static TRANSACTIONS: TableSpec = TableSpec {
    name: "transactions",
    resource: "Transaction",
    columns: &[
        ID,
        Column::new("user_id", K::BigInt).filterable(),
        Column::new("is_withdraw", K::Bool)
            .filterable()
            .with_default(D::Bool(false)),
        Column::new("amount", K::Decimal),
        Column::new("ride_id", K::BigInt).filterable(),
        CREATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "user_id",
        references: "users",
        cascade: false,
    }],
    unique: &[],
};

pub static RIDES: TableSpec = TableSpec {
    name: "rides",
    resource: "Ride",
    columns: &[
        ID,
        Column::new("client_id", K::BigInt).filterable(),
        Column::new("driver_profile_id", K::BigInt).filterable(),
        Column::new("status", K::Text)
            .filterable()
            .with_default(D::Text("requested")),
        Column::new("status_reason", K::Text),
        Column::new("scheduled_at", K::Timestamp),
        Column::new("started_at", K::Timestamp),
        Column::new("completed_at", K::Timestamp),
        Column::new("canceled_at", K::Timestamp),
        Column::new("cancellation_reason", K::Text),
        Column::new("pickup_address", K::Text),
        Column::new("pickup_lat", K::Float),
        Column::new("pickup_lng", K::Float),
        Column::new("dropoff_address", K::Text),
        Column::new("dropoff_lat", K::Float),
        Column::new("dropoff_lng", K::Float),
        Column::new("expected_fare", K::Decimal),
        Column::new("expected_fare_snapshot", K::Json).with_default(D::EmptyObject),
        Column::new("driver_fare", K::Decimal),
        Column::new("actual_fare", K::Decimal),
        Column::new("distance_meters", K::BigInt),
        Column::new("duration_seconds", K::BigInt),
        Column::new("transaction_id", K::BigInt),
        Column::new("commission_id", K::BigInt),
        Column::new("is_anomaly", K::Bool)
            .filterable()
            .with_default(D::Bool(false)),
        Column::new("anomaly_reason", K::Text),
        Column::new("ride_metadata", K::Json),
        CREATED_AT,
        UPDATED_AT,
    ],
    foreign_keys: &[
        ForeignKey {
            column: "client_id",
            references: "users",
            cascade: false,
        },
        ForeignKey {
            column: "driver_profile_id",
            references: "driver_profiles",
            cascade: false,
        },
        ForeignKey {
            column: "transaction_id",
            references: "transactions",
            cascade: false,
        },
        ForeignKey {
            column: "commission_id",
            references: "commissions",
            cascade: false,
        },
    ],
    unique: &[],
};

pub static RIDE_STATUS_HISTORY: TableSpec = TableSpec {
    name: "ride_status_history",
    resource: "RideStatusHistory",
    columns: &[
        ID,
        Column::new("ride_id", K::BigInt).filterable(),
        Column::new("from_status", K::Text),
        Column::new("to_status", K::Text).filterable(),
        Column::new("changed_by", K::BigInt),
        Column::new("actor_role", K::Text).filterable(),
        Column::new("reason", K::Text),
        Column::new("meta", K::Json).with_default(D::EmptyObject),
        CREATED_AT,
    ],
    foreign_keys: &[ForeignKey {
        column: "ride_id",
        references: "rides",
        cascade: true,
    }],
    unique: &[],
};

/// Every table, parents before children.
pub static ALL: &[&TableSpec] = &[
    &USERS,
    &ROLES,
    &DRIVER_PROFILES,
    &DRIVER_LOCATIONS,
    &DRIVER_DOCUMENTS,
    &COMMISSIONS,
    &PHONE_VERIFICATIONS,
    &TRANSACTIONS,
    &RIDES,
    &RIDE_STATUS_HISTORY,
];

pub fn find(name: &str) -> Option<&'static TableSpec> {
    ALL.iter().copied().find(|t| t.name == name)
}

/// Tables holding a foreign key to `name`.
pub fn referencing(name: &str) -> impl Iterator<Item = (&'static TableSpec, &'static ForeignKey)> + '_ {
    ALL.iter().flat_map(move |t| {
        t.foreign_keys
            .iter()
            .filter(move |fk| fk.references == name)
            .map(move |fk| (*t, fk))
    })
}

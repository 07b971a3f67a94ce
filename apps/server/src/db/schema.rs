//! Static table descriptions shared by every `RecordStore` implementation.
//!
//! The PostgreSQL store uses them to whitelist column names before they are
//! spliced into SQL; the in-memory store uses them to apply defaults and to
//! enforce the unique and foreign-key rules the migrations declare.

use super::tables;
use crate::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use std::cmp::Ordering;
use std::collections::HashMap;

pub type JsonMap = Map<String, JsonValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    BigInt,
    Text,
    Bool,
    Decimal,
    Float,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnDefault {
    None,
    Now,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'static str),
    EmptyObject,
}

impl ColumnDefault {
    pub fn value(&self, now: &JsonValue) -> JsonValue {
        match self {
            ColumnDefault::None => JsonValue::Null,
            ColumnDefault::Now => now.clone(),
            ColumnDefault::Bool(b) => JsonValue::Bool(*b),
            ColumnDefault::Int(i) => JsonValue::from(*i),
            ColumnDefault::Float(f) => JsonValue::from(*f),
            ColumnDefault::Text(s) => JsonValue::String((*s).to_string()),
            ColumnDefault::EmptyObject => JsonValue::Object(JsonMap::new()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Accepted from create/update payloads.
    pub writable: bool,
    /// Usable as an equality filter on list/count.
    pub filterable: bool,
    pub default: ColumnDefault,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            writable: true,
            filterable: false,
            default: ColumnDefault::None,
        }
    }

    pub const fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub const fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub const fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub references: &'static str,
    /// Referencing rows are removed together with the referenced row.
    pub cascade: bool,
}

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    /// Human readable resource name used in error messages.
    pub resource: &'static str,
    pub columns: &'static [Column],
    pub foreign_keys: &'static [ForeignKey],
    pub unique: &'static [&'static str],
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn touches_updated_at(&self) -> bool {
        self.has_column("updated_at")
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKey> {
        self.foreign_keys.iter().find(|fk| fk.column == column)
    }

    pub fn duplicate(&self, column: Option<&str>) -> Error {
        match column {
            Some(column) => Error::Conflict(format!(
                "{} with this {} already exists",
                self.resource, column
            )),
            None => Error::Conflict(format!("{} already exists", self.resource)),
        }
    }

    pub fn missing_reference(&self, column: &str) -> Error {
        let target = self
            .foreign_key(column)
            .and_then(|fk| tables::find(fk.references))
            .map(|t| t.resource)
            .unwrap_or("record");
        Error::ForeignKeyViolation(format!(
            "Referenced {target} does not exist ({column})"
        ))
    }

    pub fn still_referenced(&self, id: i64, by: &str) -> Error {
        Error::Conflict(format!(
            "{} with id {} is still referenced by {}",
            self.resource, id, by
        ))
    }

    /// Keep only writable, non-null values.
    pub fn writable_values(&self, values: JsonMap) -> JsonMap {
        values
            .into_iter()
            .filter(|(k, v)| !v.is_null() && self.column(k).is_some_and(|c| c.writable))
            .collect()
    }
}

/// Pagination, filtering and ordering for list queries.
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub page: u32,
    pub page_size: u32,
    pub filters: Vec<(String, JsonValue)>,
    pub sort_by: Option<String>,
    pub sort_desc: bool,
}

impl ListQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            filters: Vec::new(),
            sort_by: None,
            sort_desc: false,
        }
    }

    /// Every matching row on one page.
    pub fn unbounded() -> Self {
        Self::new(1, u32::MAX)
    }

    pub fn filter(mut self, column: &str, value: JsonValue) -> Self {
        self.filters.push((column.to_string(), value));
        self
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    /// Build a query from raw query-string parameters.
    ///
    /// `page`, `page_size`, `sort_by` and `sort_desc` are reserved. Any other
    /// parameter naming a filterable column becomes an equality filter; other
    /// names are ignored.
    pub fn from_params(
        table: &TableSpec,
        params: &HashMap<String, String>,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Result<Self> {
        let page = match params.get("page") {
            Some(raw) => parse_positive(raw, "page")?,
            None => 1,
        };
        let page_size = match params.get("page_size") {
            Some(raw) => parse_positive(raw, "page_size")?,
            None => default_page_size,
        };
        if page_size > max_page_size {
            return Err(Error::Validation(format!(
                "page_size must be <= {max_page_size}"
            )));
        }

        let sort_by = match params.get("sort_by") {
            Some(column) if table.has_column(column) => Some(column.clone()),
            Some(column) => {
                return Err(Error::Validation(format!(
                    "Cannot sort {} by unknown field '{}'",
                    table.name, column
                )))
            }
            None => None,
        };
        let sort_desc = match params.get("sort_desc").map(String::as_str) {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(Error::Validation(format!(
                    "sort_desc must be a boolean (got '{other}')"
                )))
            }
        };

        let mut filters: Vec<(String, JsonValue)> = Vec::new();
        for (key, raw) in params {
            if matches!(key.as_str(), "page" | "page_size" | "sort_by" | "sort_desc") {
                continue;
            }
            let Some(column) = table.column(key).filter(|c| c.filterable) else {
                continue;
            };
            filters.push((key.clone(), parse_filter_value(column, raw)?));
        }
        // Deterministic SQL text regardless of HashMap iteration order.
        filters.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            page,
            page_size,
            filters,
            sort_by,
            sort_desc,
        })
    }
}

fn parse_positive(raw: &str, name: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(Error::Validation(format!(
            "{name} must be a positive integer (got '{raw}')"
        ))),
    }
}

pub fn parse_filter_value(column: &Column, raw: &str) -> Result<JsonValue> {
    let invalid = || {
        Error::Validation(format!(
            "Invalid value '{}' for filter '{}'",
            raw, column.name
        ))
    };
    match column.kind {
        ColumnKind::BigInt => raw.parse::<i64>().map(JsonValue::from).map_err(|_| invalid()),
        ColumnKind::Decimal | ColumnKind::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(JsonValue::from)
            .ok_or_else(invalid),
        ColumnKind::Bool => match raw {
            "true" | "1" => Ok(JsonValue::Bool(true)),
            "false" | "0" => Ok(JsonValue::Bool(false)),
            _ => Err(invalid()),
        },
        ColumnKind::Text => Ok(JsonValue::String(raw.to_string())),
        ColumnKind::Timestamp | ColumnKind::Json => Err(Error::Validation(format!(
            "Field '{}' cannot be used as a filter",
            column.name
        ))),
    }
}

/// Equality that treats `15`, `15.0` and `15.00` as the same number.
pub fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Ordering for sorting rows; nulls sort last like PostgreSQL's ASC default.
pub fn json_cmp(a: &JsonValue, b: &JsonValue) -> Ordering {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Greater,
        (_, JsonValue::Null) => Ordering::Less,
        (JsonValue::Number(x), JsonValue::Number(y)) => x
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&y.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x.cmp(y),
        (JsonValue::String(x), JsonValue::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

//! The runtime value type shared by the schema registry, the JSON IR, the
//! SQL compiler and every driver adapter. Every column that comes back from
//! a driver, and every parameter that goes into one, is a `PrismaValue`.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Declares the shape a [`PrismaValue`] is expected to take for a given
/// field. Mirrors the `type_tag` vocabulary of the schema registry's
/// `Field` struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeIdentifier {
    Int32,
    Int64,
    Float,
    Double,
    Decimal,
    Boolean,
    String,
    DateTime,
    Date,
    Time,
    Json,
    Bytes,
    Uuid,
    Enum,
    Array,
    Unknown,
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A loosely-typed runtime value. Bind parameters, row columns and IR
/// filter literals are all represented with this type so that the
/// compiler and the deserializer never need to special-case a concrete
/// driver's wire representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrismaValue {
    String(String),
    Boolean(bool),
    Int(i64),
    Float(f64),
    Decimal(BigDecimal),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Enum(String),
    List(Vec<PrismaValue>),
    Null,
}

impl PrismaValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PrismaValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrismaValue::String(s) | PrismaValue::Enum(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PrismaValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn type_identifier(&self) -> TypeIdentifier {
        match self {
            PrismaValue::String(_) => TypeIdentifier::String,
            PrismaValue::Boolean(_) => TypeIdentifier::Boolean,
            PrismaValue::Int(_) => TypeIdentifier::Int64,
            PrismaValue::Float(_) => TypeIdentifier::Float,
            PrismaValue::Decimal(_) => TypeIdentifier::Decimal,
            PrismaValue::DateTime(_) => TypeIdentifier::DateTime,
            PrismaValue::Date(_) => TypeIdentifier::Date,
            PrismaValue::Time(_) => TypeIdentifier::Time,
            PrismaValue::Json(_) => TypeIdentifier::Json,
            PrismaValue::Bytes(_) => TypeIdentifier::Bytes,
            PrismaValue::Uuid(_) => TypeIdentifier::Uuid,
            PrismaValue::Enum(_) => TypeIdentifier::Enum,
            PrismaValue::List(_) => TypeIdentifier::Array,
            PrismaValue::Null => TypeIdentifier::Unknown,
        }
    }
}

impl From<&str> for PrismaValue {
    fn from(s: &str) -> Self {
        PrismaValue::String(s.to_owned())
    }
}

impl From<String> for PrismaValue {
    fn from(s: String) -> Self {
        PrismaValue::String(s)
    }
}

impl From<bool> for PrismaValue {
    fn from(b: bool) -> Self {
        PrismaValue::Boolean(b)
    }
}

impl From<i64> for PrismaValue {
    fn from(i: i64) -> Self {
        PrismaValue::Int(i)
    }
}

impl From<i32> for PrismaValue {
    fn from(i: i32) -> Self {
        PrismaValue::Int(i as i64)
    }
}

impl From<f64> for PrismaValue {
    fn from(f: f64) -> Self {
        PrismaValue::Float(f)
    }
}

impl From<serde_json::Value> for PrismaValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => PrismaValue::Null,
            serde_json::Value::Bool(b) => PrismaValue::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PrismaValue::Int(i)
                } else {
                    PrismaValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            serde_json::Value::String(s) => PrismaValue::String(s),
            other => PrismaValue::Json(other),
        }
    }
}

impl<T: Into<PrismaValue>> From<Option<T>> for PrismaValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => PrismaValue::Null,
        }
    }
}

//! Values bound to statements and stored on entities.
//!
//! `sea_query::Value` is the typed `(kind, value)` carrier: it is what the
//! query builder hands to the driver's binder and what rows are decoded into.
//! This module adds the kind tagging the binder needs, lossless-enough
//! accessors, and the `Param`/`Params` shapes used by conditions and
//! templates (a key maps to one value or to a list of values).
//!
//! Temporal, decimal, UUID and JSON values use the `chrono`, `rust_decimal`,
//! `uuid` and `serde_json` types sea-query carries. Their accessors also
//! parse the textual forms callers tend to pass.

pub use sea_query::Value;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_query::ValueType;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use uuid::Uuid;

/// Coarse kind of a bound value, as seen by a prepared-statement binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    Text,
    Bytes,
    Decimal,
    Temporal,
    Uuid,
    Json,
    Other,
}

/// Classify a value for binding.
pub fn kind(value: &Value) -> ValueKind {
    if is_null(value) {
        return ValueKind::Null;
    }
    match value {
        Value::Bool(_) => ValueKind::Bool,
        Value::TinyInt(_)
        | Value::SmallInt(_)
        | Value::Int(_)
        | Value::BigInt(_)
        | Value::TinyUnsigned(_)
        | Value::SmallUnsigned(_)
        | Value::Unsigned(_)
        | Value::BigUnsigned(_) => ValueKind::Integer,
        Value::Float(_) | Value::Double(_) => ValueKind::Float,
        Value::String(_) | Value::Char(_) => ValueKind::Text,
        Value::Bytes(_) => ValueKind::Bytes,
        Value::Decimal(_) => ValueKind::Decimal,
        Value::ChronoDate(_)
        | Value::ChronoTime(_)
        | Value::ChronoDateTime(_)
        | Value::ChronoDateTimeUtc(_)
        | Value::ChronoDateTimeLocal(_)
        | Value::ChronoDateTimeWithTimeZone(_) => ValueKind::Temporal,
        Value::Uuid(_) => ValueKind::Uuid,
        Value::Json(_) => ValueKind::Json,
        _ => ValueKind::Other,
    }
}

/// `true` when the value is a typed SQL `NULL`.
pub fn is_null(value: &Value) -> bool {
    matches!(
        value,
        Value::Bool(None)
            | Value::TinyInt(None)
            | Value::SmallInt(None)
            | Value::Int(None)
            | Value::BigInt(None)
            | Value::TinyUnsigned(None)
            | Value::SmallUnsigned(None)
            | Value::Unsigned(None)
            | Value::BigUnsigned(None)
            | Value::Float(None)
            | Value::Double(None)
            | Value::String(None)
            | Value::Char(None)
            | Value::Bytes(None)
            | Value::Decimal(None)
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
            | Value::ChronoDateTimeLocal(None)
            | Value::ChronoDateTimeWithTimeZone(None)
            | Value::Uuid(None)
            | Value::Json(None)
    )
}

/// A typed `NULL`.
pub fn null() -> Value {
    Value::String(None)
}

/// Integer view of a value. Text is parsed, floats are not truncated.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::TinyInt(Some(v)) => Some(i64::from(*v)),
        Value::SmallInt(Some(v)) => Some(i64::from(*v)),
        Value::Int(Some(v)) => Some(i64::from(*v)),
        Value::BigInt(Some(v)) => Some(*v),
        Value::TinyUnsigned(Some(v)) => Some(i64::from(*v)),
        Value::SmallUnsigned(Some(v)) => Some(i64::from(*v)),
        Value::Unsigned(Some(v)) => Some(i64::from(*v)),
        Value::BigUnsigned(Some(v)) => <i64 as TryFrom<u64>>::try_from(*v).ok(),
        Value::String(Some(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Floating point view of a value. Integers widen, text is parsed.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float(Some(v)) => Some(f64::from(*v)),
        Value::Double(Some(v)) => Some(*v),
        Value::String(Some(s)) => s.trim().parse().ok(),
        Value::Decimal(Some(_)) => extract::<Decimal>(value).and_then(|d| d.to_f64()),
        other => as_i64(other).map(|v| v as f64),
    }
}

/// Typed payload of `value` when it holds exactly `T`.
fn extract<T: ValueType>(value: &Value) -> Option<T> {
    <T as ValueType>::try_from(value.clone()).ok()
}

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
];

fn parse_datetime_utc(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_naive_datetime(text).map(|n| n.and_utc()))
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|d| d.naive_utc())
        })
}

/// Timestamp with time zone, normalized to UTC. Naive timestamps and text
/// without an offset are read as UTC.
pub fn as_datetime_utc(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(text) = as_str(value) {
        return parse_datetime_utc(text);
    }
    extract::<DateTime<Utc>>(value)
        .or_else(|| extract::<DateTime<FixedOffset>>(value).map(|d| d.with_timezone(&Utc)))
        .or_else(|| extract::<DateTime<Local>>(value).map(|d| d.with_timezone(&Utc)))
        .or_else(|| extract::<NaiveDateTime>(value).map(|n| n.and_utc()))
}

/// Timestamp without time zone. Zoned values are converted to UTC first.
pub fn as_datetime(value: &Value) -> Option<NaiveDateTime> {
    if let Some(text) = as_str(value) {
        return parse_naive_datetime(text);
    }
    extract::<NaiveDateTime>(value).or_else(|| as_datetime_utc(value).map(|d| d.naive_utc()))
}

pub fn as_date(value: &Value) -> Option<NaiveDate> {
    if let Some(text) = as_str(value) {
        return NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_naive_datetime(text).map(|n| n.date()));
    }
    extract::<NaiveDate>(value).or_else(|| as_datetime(value).map(|n| n.date()))
}

pub fn as_time(value: &Value) -> Option<NaiveTime> {
    if let Some(text) = as_str(value) {
        let text = text.trim();
        return NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
            .ok();
    }
    extract::<NaiveTime>(value)
}

/// Exact decimal view. Integers and text convert losslessly, floats as
/// close as the decimal allows.
pub fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(Some(_)) => extract::<Decimal>(value),
        Value::String(Some(s)) => Decimal::from_str(s.trim()).ok(),
        Value::Float(Some(f)) => <Decimal as TryFrom<f64>>::try_from(f64::from(*f)).ok(),
        Value::Double(Some(f)) => <Decimal as TryFrom<f64>>::try_from(*f).ok(),
        other => as_i64(other).map(Decimal::from),
    }
}

pub fn as_uuid(value: &Value) -> Option<Uuid> {
    match as_str(value) {
        Some(text) => Uuid::parse_str(text.trim()).ok(),
        None => extract::<Uuid>(value),
    }
}

/// JSON document view. Text holding a JSON document is parsed; any other
/// text becomes a JSON string.
pub fn as_json(value: &Value) -> JsonValue {
    match as_str(value) {
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| JsonValue::from(text)),
        None => to_json(value),
    }
}

/// Canonical text of a temporal, decimal or UUID value.
fn typed_text(value: &Value) -> Option<String> {
    match value {
        Value::ChronoDateTimeUtc(Some(_))
        | Value::ChronoDateTimeLocal(Some(_))
        | Value::ChronoDateTimeWithTimeZone(Some(_)) => {
            as_datetime_utc(value).map(|d| d.to_rfc3339())
        }
        Value::ChronoDateTime(Some(_)) => extract::<NaiveDateTime>(value).map(|n| n.to_string()),
        Value::ChronoDate(Some(_)) => extract::<NaiveDate>(value).map(|d| d.to_string()),
        Value::ChronoTime(Some(_)) => extract::<NaiveTime>(value).map(|t| t.to_string()),
        Value::Decimal(Some(_)) => extract::<Decimal>(value).map(|d| d.to_string()),
        Value::Uuid(Some(_)) => extract::<Uuid>(value).map(|u| u.to_string()),
        _ => None,
    }
}

/// Borrowed text view of a value.
pub fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(Some(s)) => Some(s.as_str()),
        _ => None,
    }
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(Some(b)) => Some(*b),
        other => as_i64(other).map(|v| v != 0),
    }
}

/// Human readable rendering used in error messages and logs.
pub fn render(value: &Value) -> String {
    match to_json(value) {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

/// Project a value onto JSON for serialization of detached entities.
pub fn to_json(value: &Value) -> JsonValue {
    if is_null(value) {
        return JsonValue::Null;
    }
    match value {
        Value::Bool(Some(b)) => JsonValue::Bool(*b),
        Value::Float(Some(f)) => serde_json::Number::from_f64(f64::from(*f))
            .map_or(JsonValue::Null, JsonValue::Number),
        Value::Double(Some(f)) => {
            serde_json::Number::from_f64(*f).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::BigUnsigned(Some(u)) => JsonValue::from(*u),
        Value::String(Some(s)) => JsonValue::String(s.to_string()),
        Value::Char(Some(c)) => JsonValue::String(c.to_string()),
        Value::Bytes(Some(b)) => JsonValue::from(b.clone()),
        Value::Json(Some(_)) => extract::<JsonValue>(value).unwrap_or(JsonValue::Null),
        other => match (as_i64(other), typed_text(other)) {
            (Some(i), _) => JsonValue::from(i),
            (None, Some(text)) => JsonValue::String(text),
            (None, None) => JsonValue::String(format!("{other:?}")),
        },
    }
}

/// A condition or template argument: one value, or a list of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    One(Value),
    Many(Vec<Value>),
}

impl Param {
    /// Build a list parameter from anything convertible to values.
    pub fn many<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Param::Many(values.into_iter().map(Into::into).collect())
    }

    /// The values this parameter binds, in order.
    pub fn values(&self) -> &[Value] {
        match self {
            Param::One(v) => std::slice::from_ref(v),
            Param::Many(vs) => vs,
        }
    }
}

macro_rules! param_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Param::One(Value::from(value))
                }
            }
        )*
    };
}

param_from_scalar!(
    &str,
    String,
    bool,
    i32,
    i64,
    u32,
    u64,
    f64,
    Decimal,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    Uuid,
);

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::One(value)
    }
}

macro_rules! param_from_list {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for Param {
                fn from(values: Vec<$ty>) -> Self {
                    Param::many(values)
                }
            }
        )*
    };
}

param_from_list!(Value, &str, String, i32, i64, u64, f64);

/// Ordered key → parameter mapping. Insertion order is preserved because
/// positional template references (`%(?)`) consume entries in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, param: impl Into<Param>) -> Self {
        self.insert(key, param);
        self
    }

    /// Insert or replace `key`, keeping the original position on replace.
    pub fn insert(&mut self, key: impl Into<String>, param: impl Into<Param>) {
        let key = key.into();
        let param = param.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = param,
            None => self.entries.push((key, param)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, p)| p)
    }

    /// Entry at insertion position `index`.
    pub fn entry_at(&self, index: usize) -> Option<(&str, &Param)> {
        self.entries.get(index).map(|(k, p)| (k.as_str(), p))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, P> FromIterator<(K, P)> for Params
where
    K: Into<String>,
    P: Into<Param>,
{
    fn from_iter<I: IntoIterator<Item = (K, P)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, p) in iter {
            params.insert(k, p);
        }
        params
    }
}

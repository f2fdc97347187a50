use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sea_query::Value;

use crate::key::{Key, Pair};
use crate::meta::Mapping;
use crate::ref_value::RefValue;
use crate::types::DataType;

/// A struct that can be stored in and rebuilt from a table.
///
/// Usually implemented with `#[derive(Persistable)]`, which generates the
/// [`Mapping`] and the member accessors from `#[persist(..)]` attributes.
///
/// ```ignore
/// #[derive(Debug, Default, Persistable)]
/// #[persist(table = "est_proposal", primary_key = "pr_key")]
/// pub struct Proposal {
///     pub key: Key,
///     #[persist(column = "proposal_name")]
///     pub prop_name: Option<String>,
///     #[persist(reference)]
///     pub contractor: Option<Contractor>,
/// }
/// ```
pub trait Persistable: Default + 'static {
    /// Resolved mapping metadata, built once per type.
    fn mapping() -> &'static Mapping;

    /// Identity of the entity. Empty until persisted.
    fn key(&self) -> &Key;

    /// Replaces the identity.
    fn set_key(&mut self, key: Key);

    /// Value bound for `member` in INSERT and UPDATE statements. `None`
    /// omits the member, as for an unset reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or cannot be bound.
    fn read(&self, member: &str) -> Result<Option<Value>>;

    /// Assigns a value to `member` while mapping a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the member is unknown or the value cannot be
    /// converted to the member's type.
    fn write(&mut self, member: &str, value: Assign<'_>) -> Result<()>;

    /// Whether the entity has not been persisted yet.
    fn is_new(&self) -> bool {
        self.key().is_empty()
    }

    /// Primary key value, if any.
    fn id(&self) -> Option<i64> {
        self.key().primary().map(Pair::value)
    }

    /// A default instance carrying `key`.
    #[must_use]
    fn with_key(key: Key) -> Self {
        let mut entity = Self::default();
        entity.set_key(key);
        entity
    }
}

/// Value handed to [`Persistable::write`].
#[derive(Debug)]
pub enum Assign<'a> {
    /// A raw cell for a scalar member.
    Cell(&'a DataType),
    /// Identity of a referenced entity.
    Reference(Key),
    /// A labeled foreign value.
    Labeled(RefValue),
}

impl Assign<'_> {
    /// Converts a cell for a scalar member.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a cell or the conversion fails.
    pub fn cell<T: FetchValue>(self) -> Result<T> {
        match self {
            Self::Cell(value) => T::fetch(value),
            other => bail!("expected a cell value, found {other:?}"),
        }
    }

    /// Builds the referenced entity.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a reference.
    pub fn reference<T: Persistable>(self) -> Result<T> {
        match self {
            Self::Reference(key) => Ok(T::with_key(key)),
            other => bail!("expected a reference key, found {other:?}"),
        }
    }

    /// Unwraps a labeled value.
    ///
    /// # Errors
    ///
    /// Returns an error if this is not a labeled value.
    pub fn labeled(self) -> Result<RefValue> {
        match self {
            Self::Labeled(value) => Ok(value),
            other => bail!("expected a labeled value, found {other:?}"),
        }
    }
}

/// Trait for types that can be converted from a cell value.
///
/// Implemented for the standard types a member can hold (`i32`, `String`,
/// `NaiveDate`, etc.) and for `Option` of each. Implement it for custom
/// member types:
///
/// ```ignore
/// impl FetchValue for UserId {
///     fn fetch(value: &DataType) -> anyhow::Result<Self> {
///         let id: String = FetchValue::fetch(value)?;
///         Ok(UserId(id))
///     }
/// }
/// ```
pub trait FetchValue: Sized {
    /// Converts a cell value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is NULL or cannot be converted to the
    /// target type.
    fn fetch(value: &DataType) -> Result<Self>;
}

// Outbound conversion (internal use only)
pub(crate) fn values_to_datatypes(values: Vec<Value>) -> Result<Vec<DataType>> {
    values.into_iter().map(value_to_datatype).collect()
}

fn value_to_datatype(value: Value) -> Result<DataType> {
    let data_type = match value {
        Value::Bool(v) => DataType::Boolean(v),
        Value::TinyInt(v) => DataType::Int32(v.map(i32::from)),
        Value::SmallInt(v) => DataType::Int32(v.map(i32::from)),
        Value::Int(v) => DataType::Int32(v),
        Value::BigInt(v) => DataType::Int64(v),
        Value::TinyUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::SmallUnsigned(v) => DataType::Uint32(v.map(u32::from)),
        Value::Unsigned(v) => DataType::Uint32(v),
        Value::BigUnsigned(v) => DataType::Uint64(v),
        Value::Float(v) => DataType::Float(v),
        Value::Double(v) => DataType::Double(v),
        Value::String(v) => DataType::Str(v.map(|value| *value)),
        Value::ChronoDate(v) => DataType::Date(v.map(|date| date.to_string())),
        Value::ChronoTime(v) => DataType::Time(v.map(|time| time.to_string())),
        Value::ChronoDateTime(v) => DataType::Timestamp(v.map(|dt| dt.to_string())),
        Value::ChronoDateTimeUtc(v) => DataType::Timestamp(v.map(|dt| dt.to_rfc3339())),
        Value::Char(v) => DataType::Str(v.map(|ch| ch.to_string())),
        Value::Bytes(v) => DataType::Binary(v.map(|bytes| *bytes)),
        other => {
            bail!("unsupported parameter value {other:?} requires explicit conversion")
        }
    };
    Ok(data_type)
}

pub(crate) const fn is_null_value(value: &Value) -> bool {
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
            | Value::ChronoDate(None)
            | Value::ChronoTime(None)
            | Value::ChronoDateTime(None)
            | Value::ChronoDateTimeUtc(None)
    )
}

// Inbound conversion
impl FetchValue for bool {
    fn fetch(value: &DataType) -> Result<Self> {
        as_bool(value)
    }
}

impl FetchValue for i32 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_i32(value)
    }
}

impl FetchValue for i64 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_i64(value)
    }
}

impl FetchValue for u32 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_u32(value)
    }
}

impl FetchValue for u64 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_u64(value)
    }
}

impl FetchValue for f32 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_f32(value)
    }
}

impl FetchValue for f64 {
    fn fetch(value: &DataType) -> Result<Self> {
        as_f64(value)
    }
}

impl FetchValue for String {
    fn fetch(value: &DataType) -> Result<Self> {
        as_string(value)
    }
}

impl FetchValue for Vec<u8> {
    fn fetch(value: &DataType) -> Result<Self> {
        as_binary(value)
    }
}

impl FetchValue for DateTime<Utc> {
    fn fetch(value: &DataType) -> Result<Self> {
        as_timestamp(value)
    }
}

impl FetchValue for NaiveDateTime {
    fn fetch(value: &DataType) -> Result<Self> {
        as_timestamp(value).map(|dt| dt.naive_utc())
    }
}

impl FetchValue for NaiveDate {
    fn fetch(value: &DataType) -> Result<Self> {
        as_date(value)
    }
}

impl FetchValue for serde_json::Value {
    fn fetch(value: &DataType) -> Result<Self> {
        as_json(value)
    }
}

impl<T: FetchValue> FetchValue for Option<T> {
    fn fetch(value: &DataType) -> Result<Self> {
        if value.is_null() { Ok(None) } else { T::fetch(value).map(Some) }
    }
}

fn as_bool(value: &DataType) -> Result<bool> {
    match value {
        DataType::Boolean(Some(v)) => Ok(*v),
        // engines without a boolean type store 0/1
        DataType::Int32(Some(v @ (0 | 1))) => Ok(*v == 1),
        DataType::Int64(Some(v @ (0 | 1))) => Ok(*v == 1),
        _ => bail!("expected boolean data type, found {value:?}"),
    }
}

fn as_i32(value: &DataType) -> Result<i32> {
    match value {
        DataType::Int32(Some(v)) => Ok(*v),
        DataType::Int64(Some(v)) => {
            i32::try_from(*v).map_err(|_e| anyhow!("value {v} out of range for int32"))
        }
        DataType::Uint32(Some(v)) => {
            i32::try_from(*v).map_err(|_e| anyhow!("value {v} out of range for int32"))
        }
        _ => bail!("expected int32 data type, found {value:?}"),
    }
}

fn as_i64(value: &DataType) -> Result<i64> {
    match value {
        DataType::Int64(Some(v)) => Ok(*v),
        DataType::Int32(Some(v)) => Ok(i64::from(*v)),
        DataType::Uint32(Some(v)) => Ok(i64::from(*v)),
        DataType::Uint64(Some(v)) => {
            i64::try_from(*v).map_err(|_e| anyhow!("value {v} out of range for int64"))
        }
        _ => bail!("expected int64 data type, found {value:?}"),
    }
}

fn as_u32(value: &DataType) -> Result<u32> {
    match value {
        DataType::Uint32(Some(v)) => Ok(*v),
        DataType::Int64(Some(v)) => {
            u32::try_from(*v).map_err(|_e| anyhow!("value {v} out of range for uint32"))
        }
        _ => bail!("expected uint32 data type, found {value:?}"),
    }
}

fn as_u64(value: &DataType) -> Result<u64> {
    match value {
        DataType::Uint64(Some(v)) => Ok(*v),
        DataType::Uint32(Some(v)) => Ok(u64::from(*v)),
        DataType::Int64(Some(v)) => {
            u64::try_from(*v).map_err(|_e| anyhow!("value {v} out of range for uint64"))
        }
        _ => bail!("expected uint64 data type, found {value:?}"),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_f32(value: &DataType) -> Result<f32> {
    match value {
        DataType::Float(Some(v)) => Ok(*v),
        DataType::Double(Some(v)) => Ok(*v as f32),
        _ => bail!("expected float data type, found {value:?}"),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: &DataType) -> Result<f64> {
    match value {
        DataType::Double(Some(v)) => Ok(*v),
        DataType::Float(Some(v)) => Ok(f64::from(*v)),
        DataType::Int32(Some(v)) => Ok(f64::from(*v)),
        DataType::Int64(Some(v)) => Ok(*v as f64),
        _ => bail!("expected double data type, found {value:?}"),
    }
}

fn as_string(value: &DataType) -> Result<String> {
    match value {
        DataType::Str(Some(raw))
        | DataType::Date(Some(raw))
        | DataType::Time(Some(raw))
        | DataType::Timestamp(Some(raw)) => Ok(raw.clone()),
        _ => bail!("expected string data type, found {value:?}"),
    }
}

fn as_binary(value: &DataType) -> Result<Vec<u8>> {
    match value {
        DataType::Binary(Some(bytes)) => Ok(bytes.clone()),
        _ => bail!("expected binary data type, found {value:?}"),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(parsed, Utc));
    }

    bail!("unsupported timestamp: {raw}; expected RFC3339 or \"%Y-%m-%d %H:%M:%S%.f\" format")
}

fn as_timestamp(value: &DataType) -> Result<DateTime<Utc>> {
    match value {
        DataType::Timestamp(Some(raw)) | DataType::Str(Some(raw)) => parse_timestamp(raw),
        _ => bail!("expected timestamp data type, found {value:?}"),
    }
}

fn as_date(value: &DataType) -> Result<NaiveDate> {
    match value {
        DataType::Date(Some(raw)) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_e| anyhow!("unsupported date: {raw}; expected \"%Y-%m-%d\" format")),
        // timestamps widen to their date
        DataType::Timestamp(Some(raw)) => parse_timestamp(raw).map(|dt| dt.date_naive()),
        DataType::Str(Some(raw)) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| parse_timestamp(raw).map(|dt| dt.date_naive()))
            .with_context(|| format!("unsupported date: {raw}")),
        _ => bail!("expected date data type, found {value:?}"),
    }
}

fn as_json(value: &DataType) -> Result<serde_json::Value> {
    match value {
        DataType::Str(Some(raw)) => Ok(serde_json::from_str(raw)?),
        DataType::Binary(Some(bytes)) => Ok(serde_json::from_slice(bytes)?),
        _ => bail!("expected json compatible data type, found {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_to_numeric_types() {
        let val_bool = value_to_datatype(Value::Bool(Some(true))).unwrap();
        assert!(matches!(val_bool, DataType::Boolean(Some(true))));

        let val_int = value_to_datatype(Value::Int(Some(42))).unwrap();
        assert!(matches!(val_int, DataType::Int32(Some(42))));

        let val_bigint = value_to_datatype(Value::BigInt(Some(999))).unwrap();
        assert!(matches!(val_bigint, DataType::Int64(Some(999))));

        let val_small = value_to_datatype(Value::SmallInt(Some(1000))).unwrap();
        assert!(matches!(val_small, DataType::Int32(Some(1000))));

        let val_unsigned = value_to_datatype(Value::Unsigned(Some(1000))).unwrap();
        assert!(matches!(val_unsigned, DataType::Uint32(Some(1000))));

        let val_f64 = value_to_datatype(Value::Double(Some(std::f64::consts::E))).unwrap();
        assert!(
            matches!(val_f64, DataType::Double(Some(v)) if (v - std::f64::consts::E).abs() < 0.001)
        );
    }

    #[test]
    fn value_to_datetime_types() {
        use chrono::NaiveTime;

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let val_date = value_to_datatype(Value::from(date)).unwrap();
        assert_eq!(val_date, DataType::Date(Some("2024-01-15".to_string())));

        let time = NaiveTime::from_hms_opt(10, 30, 45).unwrap();
        let val_time = value_to_datatype(Value::from(time)).unwrap();
        assert!(matches!(val_time, DataType::Time(Some(s)) if s.starts_with("10:30:45")));

        let dt_utc: DateTime<Utc> = "2024-01-15T10:30:45Z".parse().unwrap();
        let val_dt_utc = value_to_datatype(Value::from(dt_utc)).unwrap();
        assert!(matches!(val_dt_utc, DataType::Timestamp(Some(s)) if s.contains("10:30:45")));
    }

    #[test]
    fn value_to_null_variants() {
        let val_int = value_to_datatype(Value::Int(None)).unwrap();
        assert!(matches!(val_int, DataType::Int32(None)));

        let val_string = value_to_datatype(Value::from(None::<String>)).unwrap();
        assert!(matches!(val_string, DataType::Str(None)));
    }

    #[test]
    fn narrowing_overflow_fails() {
        assert_eq!(as_i32(&DataType::Int64(Some(42))).unwrap(), 42);

        let err = as_i32(&DataType::Int64(Some(i64::from(i32::MAX) + 1))).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn integer_booleans() {
        assert!(as_bool(&DataType::Int64(Some(1))).unwrap());
        assert!(!as_bool(&DataType::Int64(Some(0))).unwrap());
        as_bool(&DataType::Int64(Some(2))).unwrap_err();
    }

    #[test]
    fn dates_widen_from_timestamps() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        assert_eq!(as_date(&DataType::Date(Some("2024-03-09".to_string()))).unwrap(), expected);
        assert_eq!(
            as_date(&DataType::Timestamp(Some("2024-03-09 17:45:00".to_string()))).unwrap(),
            expected
        );
        assert_eq!(
            as_date(&DataType::Str(Some("2024-03-09T17:45:00Z".to_string()))).unwrap(),
            expected
        );
    }

    #[test]
    fn option_maps_null() {
        let none: Option<i32> = FetchValue::fetch(&DataType::Str(None)).unwrap();
        assert!(none.is_none());

        let some: Option<i32> = FetchValue::fetch(&DataType::Int64(Some(3))).unwrap();
        assert_eq!(some, Some(3));

        // non-optional targets reject NULL
        <i32 as FetchValue>::fetch(&DataType::Int64(None)).unwrap_err();
    }

    #[test]
    fn type_conversion_errors() {
        as_i64(&DataType::Boolean(Some(true))).unwrap_err();
        as_string(&DataType::Int32(Some(42))).unwrap_err();
        as_binary(&DataType::Str(Some("not binary".to_string()))).unwrap_err();

        let result = as_timestamp(&DataType::Timestamp(Some("invalid date".to_string())));
        assert!(result.unwrap_err().to_string().contains("unsupported timestamp"));

        as_json(&DataType::Str(Some("not json".to_string()))).unwrap_err();
    }
}

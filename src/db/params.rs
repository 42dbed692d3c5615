//! Parameter binding for PostgreSQL queries.
//!
//! Every caller-supplied value reaches the server through these functions,
//! never through statement text.
//!
//! JSON strings are ambiguous: `"happy"` may target an enum column and
//! `"2024-05-01"` a date column. When the server has described a statement,
//! [`coerce_params`] shapes each string for the type inferred for its
//! placeholder; everything else binds with its own type.

use crate::db::types::{
    TypeCategory, categorize_type, encode_inet, encode_macaddr, encode_numeric, parse_interval,
    parse_money, parse_time_tz,
};
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgTypeInfo, PgTypeKind};
use sqlx::types::Json;
use sqlx::{Postgres, Type, TypeInfo};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// A parameter in the Rust type that encodes as its placeholder's type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgParam {
    /// Bound with the value's own type.
    Value(SqlValue),
    Int2(i16),
    Int4(i32),
    Float4(f32),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(PgTimeTz<NaiveTime, FixedOffset>),
    Interval(PgInterval),
    Money(PgMoney),
    Oid(Oid),
    /// Binary wire bytes sent under an explicit type OID.
    Raw { oid: Oid, bytes: Vec<u8> },
}

impl From<&SqlValue> for PgParam {
    fn from(value: &SqlValue) -> Self {
        PgParam::Value(value.clone())
    }
}

/// A NULL sent with an unspecified parameter type, so the server infers the
/// type from the target column instead of rejecting e.g. `text` for `integer`.
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Pre-encoded bytes whose type is only known at runtime.
#[derive(Debug)]
struct RawParam {
    oid: Oid,
    bytes: Vec<u8>,
}

impl Type<Postgres> for RawParam {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for RawParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(&self.bytes);
        Ok(IsNull::No)
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(PgTypeInfo::with_oid(self.oid))
    }
}

/// Shape every string parameter for the type the server inferred for its
/// placeholder. Values without a slot, and non-string values, pass through.
///
/// A string the target type cannot read fails the statement the way the
/// server would, with SQLSTATE `22P02`.
pub(crate) fn coerce_params(params: &[SqlValue], slots: &[PgTypeInfo]) -> DbResult<Vec<PgParam>> {
    params
        .iter()
        .enumerate()
        .map(|(idx, value)| match (value, slots.get(idx)) {
            (SqlValue::String(text), Some(slot)) => coerce_string(text, slot).map_err(|reason| {
                DbError::database(
                    format!(
                        "invalid input for parameter ${} of type {}: {}",
                        idx + 1,
                        slot.name(),
                        reason
                    ),
                    Some("22P02".to_string()),
                    "Check that the values match their column types",
                )
            }),
            _ => Ok(PgParam::from(value)),
        })
        .collect()
}

fn coerce_string(text: &str, slot: &PgTypeInfo) -> Result<PgParam, String> {
    let raw = |bytes: Vec<u8>| PgParam::Raw {
        oid: slot.oid().unwrap_or(Oid(0)),
        bytes,
    };

    let category = categorize_type(slot.name());
    if category == TypeCategory::Unknown {
        match slot.kind() {
            PgTypeKind::Enum(labels) => {
                return if labels.iter().any(|label| label == text) {
                    Ok(raw(text.as_bytes().to_vec()))
                } else {
                    Err(format!("'{}' is not one of: {}", text, labels.join(", ")))
                };
            }
            PgTypeKind::Domain(base) => return coerce_string(text, base),
            _ => {}
        }
    }

    let invalid = |e: &dyn std::fmt::Display| format!("'{}': {}", text, e);
    let trimmed = text.trim();
    let param = match category {
        TypeCategory::SmallInt => PgParam::Int2(trimmed.parse::<i16>().map_err(|e| invalid(&e))?),
        TypeCategory::Int => PgParam::Int4(trimmed.parse::<i32>().map_err(|e| invalid(&e))?),
        TypeCategory::BigInt => {
            PgParam::Value(SqlValue::Int(trimmed.parse::<i64>().map_err(|e| invalid(&e))?))
        }
        TypeCategory::Real => PgParam::Float4(trimmed.parse::<f32>().map_err(|e| invalid(&e))?),
        TypeCategory::Double => {
            PgParam::Value(SqlValue::Float(trimmed.parse::<f64>().map_err(|e| invalid(&e))?))
        }
        TypeCategory::Decimal => raw(encode_numeric(text).map_err(|e| invalid(&e))?),
        TypeCategory::Money => {
            PgParam::Money(PgMoney(parse_money(text).map_err(|e| invalid(&e))?))
        }
        TypeCategory::Boolean => PgParam::Value(SqlValue::Bool(
            parse_bool(trimmed).ok_or_else(|| invalid(&"not a boolean"))?,
        )),
        TypeCategory::Json => PgParam::Value(SqlValue::Json(
            serde_json::from_str::<serde_json::Value>(text).map_err(|e| invalid(&e))?,
        )),
        TypeCategory::Uuid => {
            PgParam::Uuid(uuid::Uuid::parse_str(trimmed).map_err(|e| invalid(&e))?)
        }
        TypeCategory::Oid => PgParam::Oid(Oid(trimmed.parse::<u32>().map_err(|e| invalid(&e))?)),
        TypeCategory::Timestamp => match SqlValue::parse_timestamp(text) {
            Ok(SqlValue::TimestampTz(dt)) => PgParam::Value(SqlValue::Timestamp(dt.naive_local())),
            Ok(other) => PgParam::Value(other),
            Err(_) => return Err(invalid(&"not a timestamp")),
        },
        TypeCategory::TimestampTz => match SqlValue::parse_timestamp(text) {
            // Naive input is read as UTC, the session time zone.
            Ok(SqlValue::Timestamp(dt)) => {
                PgParam::Value(SqlValue::TimestampTz(dt.and_utc().fixed_offset()))
            }
            Ok(other) => PgParam::Value(other),
            Err(_) => return Err(invalid(&"not a timestamp")),
        },
        TypeCategory::Date => PgParam::Date(
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|e| invalid(&e))?,
        ),
        TypeCategory::Time => PgParam::Time(
            ["%H:%M:%S%.f", "%H:%M"]
                .iter()
                .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
                .ok_or_else(|| invalid(&"not a time of day"))?,
        ),
        TypeCategory::TimeTz => PgParam::TimeTz(parse_time_tz(text).map_err(|e| invalid(&e))?),
        TypeCategory::Interval => {
            PgParam::Interval(parse_interval(text).map_err(|e| invalid(&e))?)
        }
        TypeCategory::Inet => {
            let cidr = slot.name().eq_ignore_ascii_case("cidr");
            raw(encode_inet(text, cidr).map_err(|e| invalid(&e))?)
        }
        TypeCategory::MacAddr => {
            let len = if slot.name().eq_ignore_ascii_case("macaddr8") { 8 } else { 6 };
            raw(encode_macaddr(text, len).map_err(|e| invalid(&e))?)
        }
        TypeCategory::Text
        | TypeCategory::Binary
        | TypeCategory::Unknown => PgParam::Value(SqlValue::String(text.to_string())),
    };
    Ok(param)
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn bind_value<'q>(query: PgQuery<'q>, value: SqlValue) -> PgQuery<'q> {
    match value {
        SqlValue::Null => query.bind(UntypedNull),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Float(v) => query.bind(v),
        SqlValue::String(v) => query.bind(v),
        SqlValue::Json(v) => query.bind(Json(v)),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::TimestampTz(v) => query.bind(v),
    }
}

/// Bind a single value to a PostgreSQL query.
pub(crate) fn bind_param<'q>(query: PgQuery<'q>, param: PgParam) -> PgQuery<'q> {
    match param {
        PgParam::Value(value) => bind_value(query, value),
        PgParam::Int2(v) => query.bind(v),
        PgParam::Int4(v) => query.bind(v),
        PgParam::Float4(v) => query.bind(v),
        PgParam::Uuid(v) => query.bind(v),
        PgParam::Date(v) => query.bind(v),
        PgParam::Time(v) => query.bind(v),
        PgParam::TimeTz(v) => query.bind(v),
        PgParam::Interval(v) => query.bind(v),
        PgParam::Money(v) => query.bind(v),
        PgParam::Oid(v) => query.bind(v),
        PgParam::Raw { oid, bytes } => query.bind(RawParam { oid, bytes }),
    }
}

/// Bind all values in placeholder order.
pub(crate) fn bind_all<'q>(query: PgQuery<'q>, params: Vec<PgParam>) -> PgQuery<'q> {
    params.into_iter().fold(query, bind_param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn slot<T: Type<Postgres>>() -> PgTypeInfo {
        T::type_info()
    }

    fn coerce_one(value: SqlValue, slot: PgTypeInfo) -> DbResult<PgParam> {
        coerce_params(&[value], &[slot]).map(|mut params| params.remove(0))
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::String(s.to_string())
    }

    #[test]
    fn test_without_slots_values_pass_through() {
        let params = vec![text("happy"), SqlValue::Int(3), SqlValue::Null];
        let coerced = coerce_params(&params, &[]).unwrap();
        assert_eq!(
            coerced,
            params.iter().map(PgParam::from).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_uuid_slot_parses_text() {
        let id = "0b9f6a3e-36f1-4b40-9d0a-5d1c1f1b2c3d";
        assert_eq!(
            coerce_one(text(id), slot::<uuid::Uuid>()).unwrap(),
            PgParam::Uuid(uuid::Uuid::parse_str(id).unwrap())
        );
    }

    #[test]
    fn test_text_slot_keeps_string() {
        assert_eq!(
            coerce_one(text("42"), slot::<String>()).unwrap(),
            PgParam::Value(text("42"))
        );
    }

    #[test]
    fn test_integer_slots_are_range_checked() {
        assert_eq!(coerce_one(text(" 7 "), slot::<i16>()).unwrap(), PgParam::Int2(7));
        assert_eq!(coerce_one(text("70000"), slot::<i32>()).unwrap(), PgParam::Int4(70000));
        assert_eq!(
            coerce_one(text("-9"), slot::<i64>()).unwrap(),
            PgParam::Value(SqlValue::Int(-9))
        );

        let err = coerce_one(text("70000"), slot::<i16>()).unwrap_err();
        assert_eq!(err.sql_state(), Some("22P02"));
        assert!(err.to_string().contains("$1"));
    }

    #[test]
    fn test_non_string_values_keep_their_type() {
        assert_eq!(
            coerce_one(SqlValue::Int(5), slot::<i16>()).unwrap(),
            PgParam::Value(SqlValue::Int(5))
        );
        assert_eq!(
            coerce_one(SqlValue::Null, slot::<uuid::Uuid>()).unwrap(),
            PgParam::Value(SqlValue::Null)
        );
    }

    #[test]
    fn test_boolean_spellings() {
        for (input, expected) in [("true", true), ("Yes", true), ("off", false), ("0", false)] {
            assert_eq!(
                coerce_one(text(input), slot::<bool>()).unwrap(),
                PgParam::Value(SqlValue::Bool(expected))
            );
        }
        assert!(coerce_one(text("maybe"), slot::<bool>()).is_err());
    }

    #[test]
    fn test_temporal_slots() {
        assert_eq!(
            coerce_one(text("2024-05-01"), slot::<NaiveDate>()).unwrap(),
            PgParam::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
        );
        assert_eq!(
            coerce_one(text("10:30"), slot::<NaiveTime>()).unwrap(),
            PgParam::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );

        match coerce_one(text("2024-05-01T10:30:00+02:00"), slot::<NaiveDateTime>()).unwrap() {
            PgParam::Value(SqlValue::Timestamp(dt)) => {
                assert_eq!(dt.to_string(), "2024-05-01 10:30:00")
            }
            other => panic!("expected naive timestamp, got {:?}", other),
        }
        match coerce_one(
            text("2024-05-01 10:30:00"),
            slot::<chrono::DateTime<chrono::Utc>>(),
        )
        .unwrap()
        {
            PgParam::Value(SqlValue::TimestampTz(dt)) => assert_eq!(dt.offset().local_minus_utc(), 0),
            other => panic!("expected timestamptz, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_slot_sends_binary_numeric() {
        let slot = slot::<crate::db::types::RawDecimal>();
        match coerce_one(text("12.50"), slot).unwrap() {
            PgParam::Raw { bytes, .. } => {
                assert_eq!(bytes, encode_numeric("12.50").unwrap());
            }
            other => panic!("expected raw numeric, got {:?}", other),
        }
    }

    #[test]
    fn test_json_slot_requires_json_text() {
        assert_eq!(
            coerce_one(text(r#"{"a": 1}"#), slot::<Json<serde_json::Value>>()).unwrap(),
            PgParam::Value(SqlValue::Json(serde_json::json!({"a": 1})))
        );
        assert!(coerce_one(text("not json"), slot::<Json<serde_json::Value>>()).is_err());
    }

    #[test]
    fn test_interval_and_timetz_slots() {
        assert_eq!(
            coerce_one(text("3 days"), slot::<PgInterval>()).unwrap(),
            PgParam::Interval(PgInterval {
                months: 0,
                days: 3,
                microseconds: 0
            })
        );
        assert!(matches!(
            coerce_one(text("10:30:00+02"), slot::<PgTimeTz<NaiveTime, FixedOffset>>()).unwrap(),
            PgParam::TimeTz(_)
        ));
    }

    #[test]
    fn test_parse_bool_rejects_unknown() {
        assert_eq!(parse_bool("t"), Some(true));
        assert_eq!(parse_bool("nope"), None);
    }
}

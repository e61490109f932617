//! Custom scalar decoding.
//!
//! Date-like scalars arrive as epoch seconds (number or numeric string) or as
//! calendar strings. [`decode_unix_date_time`] handles all three shapes and
//! backs the [`UnixDateTime`] newtype, the [`unix_date_time`] serde helpers
//! and the [`UnixDateTimeConverter`].
//!
//! Encoding writes whole seconds since the epoch.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ScalarDecodeError;

/// Rewrites a JSON value before the target type decodes it.
///
/// Converters are registered per field name in
/// [`DecodeOptions`](crate::decode::DecodeOptions).
pub trait ScalarConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Convert `value` into the shape the target type expects.
    fn convert(&self, value: Value) -> Result<Value, ScalarDecodeError>;
}

/// Decode an epoch-seconds or calendar scalar.
///
/// Returns `Ok(None)` for null when `nullable` is set.
pub fn decode_unix_date_time(
    value: &Value,
    nullable: bool,
) -> Result<Option<DateTime<Utc>>, ScalarDecodeError> {
    match value {
        Value::Null if nullable => Ok(None),
        Value::Null => Err(ScalarDecodeError::UnexpectedNull("DateTime<Utc>")),
        Value::Number(n) => {
            let seconds = n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from))
                .ok_or(ScalarDecodeError::UnexpectedToken("non-integer number"))?;
            from_epoch_seconds(seconds).map(Some)
        }
        Value::String(s) => match s.trim().parse::<i128>() {
            Ok(seconds) => from_epoch_seconds(seconds).map(Some),
            Err(_) => parse_calendar(s).map(Some),
        },
        Value::Bool(_) => Err(ScalarDecodeError::UnexpectedToken("boolean")),
        Value::Array(_) => Err(ScalarDecodeError::UnexpectedToken("array")),
        Value::Object(_) => Err(ScalarDecodeError::UnexpectedToken("object")),
    }
}

fn from_epoch_seconds(seconds: i128) -> Result<DateTime<Utc>, ScalarDecodeError> {
    if seconds < 0 {
        return Err(ScalarDecodeError::BeforeEpoch(seconds));
    }
    i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or(ScalarDecodeError::OutOfRange(seconds))
}

fn parse_calendar(s: &str) -> Result<DateTime<Utc>, ScalarDecodeError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Offset-less forms are taken as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ScalarDecodeError::InvalidDate(s.to_owned()))
}

/// A point in time decoded from epoch seconds or a calendar string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnixDateTime(pub DateTime<Utc>);

impl UnixDateTime {
    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    /// Whole seconds since the epoch.
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp()
    }
}

impl From<DateTime<Utc>> for UnixDateTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for UnixDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for UnixDateTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        unix_date_time::deserialize(deserializer).map(Self)
    }
}

impl Serialize for UnixDateTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        unix_date_time::serialize(&self.0, serializer)
    }
}

/// Serde helpers for `DateTime<Utc>` fields.
///
/// ```ignore
/// #[derive(Deserialize)]
/// struct Launch {
///     #[serde(with = "graphq_core::scalar::unix_date_time")]
///     launched_at: DateTime<Utc>,
///     #[serde(default, with = "graphq_core::scalar::unix_date_time::option")]
///     landed_at: Option<DateTime<Utc>>,
/// }
/// ```
pub mod unix_date_time {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        deserialize_scalar(deserializer, UNIX_DATE_TIME_TOKEN)?
            .ok_or_else(|| de::Error::custom(ScalarDecodeError::UnexpectedNull("DateTime<Utc>")))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.timestamp())
    }

    /// Nullable variant.
    pub mod option {
        use super::super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            deserialize_scalar(deserializer, NULLABLE_UNIX_DATE_TIME_TOKEN)
        }

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_i64(dt.timestamp()),
                None => serializer.serialize_none(),
            }
        }
    }
}

/// Newtype names that mark an epoch date for the decode pipeline.
///
/// The options-aware deserializer recognizes them and reports failures as a
/// typed [`ScalarDecodeError`]; any other deserializer just sees a newtype.
pub(crate) const UNIX_DATE_TIME_TOKEN: &str = "$graphq::UnixDateTime";
pub(crate) const NULLABLE_UNIX_DATE_TIME_TOKEN: &str = "$graphq::UnixDateTime?";

/// Whether a newtype name marks an epoch date, and if so whether null is allowed.
pub(crate) fn scalar_token(name: &str) -> Option<bool> {
    match name {
        UNIX_DATE_TIME_TOKEN => Some(false),
        NULLABLE_UNIX_DATE_TIME_TOKEN => Some(true),
        _ => None,
    }
}

fn deserialize_scalar<'de, D: Deserializer<'de>>(
    deserializer: D,
    token: &'static str,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    deserializer.deserialize_newtype_struct(
        token,
        UnixDateTimeVisitor {
            nullable: token == NULLABLE_UNIX_DATE_TIME_TOKEN,
        },
    )
}

struct UnixDateTimeVisitor {
    nullable: bool,
}

impl<'de> de::Visitor<'de> for UnixDateTimeVisitor {
    type Value = Option<DateTime<Utc>>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("epoch seconds or a date string")
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        let value = Value::deserialize(deserializer)?;
        decode_unix_date_time(&value, self.nullable).map_err(de::Error::custom)
    }
}

/// Rewrites epoch-seconds dates to RFC 3339 strings.
///
/// Lets plain `DateTime<Utc>` and `Option<DateTime<Utc>>` fields decode epoch
/// values without a serde attribute. Nulls pass through so that the field's
/// own nullability decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixDateTimeConverter;

impl ScalarConverter for UnixDateTimeConverter {
    fn name(&self) -> &'static str {
        "unix_date_time"
    }

    fn convert(&self, value: Value) -> Result<Value, ScalarDecodeError> {
        Ok(match decode_unix_date_time(&value, true)? {
            Some(dt) => Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn decode(value: Value) -> Result<Option<DateTime<Utc>>, ScalarDecodeError> {
        decode_unix_date_time(&value, false)
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(decode(json!(0)), Ok(Some(utc(1970, 1, 1, 0, 0, 0))));
        assert_eq!(decode(json!(100)), Ok(Some(utc(1970, 1, 1, 0, 1, 40))));
    }

    #[test]
    fn test_negative_epoch_is_rejected() {
        assert_eq!(decode(json!(-1)), Err(ScalarDecodeError::BeforeEpoch(-1)));
        assert_eq!(decode(json!("-1")), Err(ScalarDecodeError::BeforeEpoch(-1)));
    }

    #[test]
    fn test_numeric_string_matches_integer() {
        assert_eq!(decode(json!("1700000000")), decode(json!(1_700_000_000)));
        assert_eq!(decode(json!("1700000000")), Ok(Some(utc(2023, 11, 14, 22, 13, 20))));
    }

    #[test]
    fn test_calendar_strings() {
        assert_eq!(
            decode(json!("2024-01-01T00:00:00Z")),
            Ok(Some(utc(2024, 1, 1, 0, 0, 0)))
        );
        assert_eq!(
            decode(json!("2024-01-01T02:00:00+02:00")),
            Ok(Some(utc(2024, 1, 1, 0, 0, 0)))
        );
        assert_eq!(
            decode(json!("2024-03-05 10:20:30")),
            Ok(Some(utc(2024, 3, 5, 10, 20, 30)))
        );
        assert_eq!(decode(json!("2024-03-05")), Ok(Some(utc(2024, 3, 5, 0, 0, 0))));
    }

    #[test]
    fn test_integers_beyond_range_are_out_of_range() {
        assert_eq!(
            decode(json!(u64::MAX)),
            Err(ScalarDecodeError::OutOfRange(i128::from(u64::MAX)))
        );
        assert_eq!(
            decode(json!("18446744073709551615")),
            Err(ScalarDecodeError::OutOfRange(18_446_744_073_709_551_615))
        );
        assert_eq!(
            decode(json!(i64::MAX)),
            Err(ScalarDecodeError::OutOfRange(i128::from(i64::MAX)))
        );
    }

    #[test]
    fn test_invalid_date_string() {
        assert_eq!(
            decode(json!("yesterday")),
            Err(ScalarDecodeError::InvalidDate("yesterday".into()))
        );
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(
            decode(Value::Null),
            Err(ScalarDecodeError::UnexpectedNull("DateTime<Utc>"))
        );
        assert_eq!(decode_unix_date_time(&Value::Null, true), Ok(None));
    }

    #[test]
    fn test_unexpected_tokens() {
        assert_eq!(decode(json!(true)), Err(ScalarDecodeError::UnexpectedToken("boolean")));
        assert_eq!(decode(json!([1])), Err(ScalarDecodeError::UnexpectedToken("array")));
        assert_eq!(
            decode(json!(1.5)),
            Err(ScalarDecodeError::UnexpectedToken("non-integer number"))
        );
    }

    #[test]
    fn test_serde_helpers() {
        #[derive(Debug, serde::Deserialize, serde::Serialize)]
        struct Launch {
            #[serde(with = "unix_date_time")]
            launched_at: DateTime<Utc>,
            #[serde(default, with = "unix_date_time::option")]
            landed_at: Option<DateTime<Utc>>,
        }

        let launch: Launch =
            serde_json::from_value(json!({"launched_at": 100, "landed_at": null})).unwrap();
        assert_eq!(launch.launched_at, utc(1970, 1, 1, 0, 1, 40));
        assert_eq!(launch.landed_at, None);
        assert_eq!(
            serde_json::to_value(&launch).unwrap(),
            json!({"launched_at": 100, "landed_at": null})
        );

        let err = serde_json::from_value::<Launch>(json!({"launched_at": null})).unwrap_err();
        assert!(err.to_string().contains("cannot convert null"));
    }

    #[test]
    fn test_newtype_round_trip_as_seconds() {
        let value: UnixDateTime = serde_json::from_value(json!("1700000000")).unwrap();
        assert_eq!(value.timestamp(), 1_700_000_000);
        assert_eq!(serde_json::to_value(value).unwrap(), json!(1_700_000_000));
        assert_eq!(UnixDateTime(utc(1970, 1, 1, 0, 0, 0)).to_string(), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_converter_rewrites_to_rfc3339() {
        let converted = UnixDateTimeConverter.convert(json!(100)).unwrap();
        assert_eq!(converted, json!("1970-01-01T00:01:40Z"));
        assert_eq!(UnixDateTimeConverter.convert(Value::Null).unwrap(), Value::Null);
        assert!(UnixDateTimeConverter.convert(json!(-5)).is_err());
    }
}

use chrono::{DateTime, Utc};

use super::Precision;
use crate::error::EncodeError;

/// Converts a point in time to the integer the server stores for `precision`.
pub fn timestamp_to_i64(ts: &DateTime<Utc>, precision: Precision) -> Result<i64, EncodeError> {
    match precision {
        Precision::Second => Ok(ts.timestamp()),
        Precision::Millisecond => Ok(ts.timestamp_millis()),
        Precision::Microsecond => Ok(ts.timestamp_micros()),
        Precision::Nanosecond => ts
            .timestamp_nanos_opt()
            .ok_or(EncodeError::TimestampOutOfRange),
    }
}

/// Inverse of [`timestamp_to_i64`], used when reading server-side integers back.
pub fn i64_to_timestamp(raw: i64, precision: Precision) -> Option<DateTime<Utc>> {
    match precision {
        Precision::Second => DateTime::from_timestamp(raw, 0),
        Precision::Millisecond => DateTime::from_timestamp_millis(raw),
        Precision::Microsecond => DateTime::from_timestamp_micros(raw),
        Precision::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    }
}

//! Custom deserialisation functions for provider payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Deserialize an `i64` of epoch milliseconds as a `DateTime<Utc>`.
pub fn de_i64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = i64::deserialize(deserializer)?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| serde::de::Error::custom(format!("epoch millis out of range: {millis}")))
}

pub(crate) mod lock;

use time::OffsetDateTime;

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_epoch_millis() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

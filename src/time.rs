//! Time conversion utilities.
//!
//! The data model stores `atime`/`mtime`/`ctime` as milliseconds since the
//! Unix epoch (spec §3). These helpers convert to and from `SystemTime` at
//! the kernel callback boundary, the same role the teacher's own
//! `time_from_system_time`/`system_time_from_time` play for `timespec`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Converts a `SystemTime` to milliseconds since the Unix epoch.
///
/// Handles times before the epoch by returning a negative value. Values
/// that overflow `i64` milliseconds saturate to `i64::MAX`/`i64::MIN`.
pub fn millis_from_system_time(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(before_epoch) => {
            let d = before_epoch.duration();
            i64::try_from(d.as_millis())
                .map(|ms| -ms)
                .unwrap_or(i64::MIN)
        }
    }
}

/// Converts milliseconds since the Unix epoch back to a `SystemTime`.
pub fn system_time_from_millis(ms: i64) -> SystemTime {
    if ms >= 0 {
        UNIX_EPOCH + Duration::from_millis(ms as u64)
    } else {
        UNIX_EPOCH - Duration::from_millis((-ms) as u64)
    }
}

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    millis_from_system_time(SystemTime::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_after_epoch() {
        let t = UNIX_EPOCH + Duration::from_millis(123_456);
        let ms = millis_from_system_time(t);
        assert_eq!(ms, 123_456);
        assert_eq!(system_time_from_millis(ms), t);
    }

    #[test]
    fn roundtrip_before_epoch() {
        let t = UNIX_EPOCH - Duration::from_millis(9_000);
        let ms = millis_from_system_time(t);
        assert_eq!(ms, -9_000);
        assert_eq!(system_time_from_millis(ms), t);
    }

    #[test]
    fn now_is_positive_and_recent() {
        // Sanity bound: anything after 2020-01-01T00:00:00Z in ms.
        assert!(now_millis() > 1_577_836_800_000);
    }
}

//! Detection of clock-driven writes.
//!
//! An application (or the artifact generation mechanism itself) often
//! stamps the current time into a row or preference. Such a Modified record
//! only proves that the clock moved: its new value is the capture time of
//! the run it was observed in.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::differ::{ChangeType, DiffRecord};

/// Whether `record` is a Modified record explained by the clock alone.
///
/// True for timestamp-only changes, and for records whose changed fields all
/// hold the run's own capture time (epoch seconds, epoch milliseconds or
/// RFC 3339) within `tolerance_secs`.
pub(crate) fn is_clock_driven(record: &DiffRecord, tolerance_secs: u64) -> bool {
    if record.change_type != ChangeType::Modified {
        return false;
    }
    if record.timestamp_only {
        return true;
    }
    if record.changed_fields.is_empty() {
        return false;
    }

    let fields = match record.after.as_ref().map(|after| after.fields()) {
        Some(Ok(fields)) => fields,
        _ => return false,
    };

    record.changed_fields.iter().all(|name| {
        fields
            .get(name)
            .map_or(false, |value| matches_capture_time(value, record.observed_at, tolerance_secs))
    })
}

fn matches_capture_time(value: &Value, captured_at: DateTime<Utc>, tolerance_secs: u64) -> bool {
    match value {
        Value::Number(number) => number
            .as_i64()
            .map_or(false, |epoch| epoch_matches(epoch, captured_at, tolerance_secs)),
        Value::String(text) => {
            let text = text.trim();
            if let Ok(epoch) = text.parse::<i64>() {
                epoch_matches(epoch, captured_at, tolerance_secs)
            } else if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                let delta = parsed.with_timezone(&Utc) - captured_at;
                delta.num_seconds().unsigned_abs() <= tolerance_secs
            } else {
                false
            }
        }
        _ => false,
    }
}

fn epoch_matches(epoch: i64, captured_at: DateTime<Utc>, tolerance_secs: u64) -> bool {
    epoch.abs_diff(captured_at.timestamp()) <= tolerance_secs
        || epoch.abs_diff(captured_at.timestamp_millis()) <= tolerance_secs.saturating_mul(1000)
}

//! Contract expiry

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use crate::document::NEVER_EXPIRES;

/// Whether a contract with expiry `expires` has expired now
pub fn did_expire(expires: &str) -> bool {
    did_expire_at(expires, Utc::now())
}

/// Whether a contract with expiry `expires` had expired at `now`
///
/// `"NEVER"` never expires. Otherwise the contract is expired once `now` is
/// strictly after the expiry instant. An expiry that cannot be read has no
/// instant to pass, so it never expires.
pub fn did_expire_at(expires: &str, now: DateTime<Utc>) -> bool {
    if expires == NEVER_EXPIRES {
        return false;
    }

    match parse_timestamp(expires) {
        Some(expiry) => now > expiry,
        None => {
            warn!("Unreadable expiry '{}', contract does not expire", expires);
            false
        }
    }
}

/// Date-time layouts carrying an offset, `T` or space separated
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

/// Date-time layouts without an offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
];

/// Date-only layouts
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse an ISO 8601 timestamp
///
/// Accepts RFC 3339, `T` or space separators, `±HH:MM` and `±HHMM`
/// offsets, and `YYYY-MM-DD` or `YYYY/MM/DD` dates. Values without an
/// offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // A trailing `Z` is the zero offset
    let zoned = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(rest) => format!("{}+0000", rest),
        None => raw.to_string(),
    };
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&zoned, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

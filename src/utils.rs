use crate::prelude::*;

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// RFC 3339 in UTC with a `Z` suffix, e.g. `2025-12-31T00:00:00Z`.
pub fn format_timestamp(date: DateTime) -> String {
  date.and_utc().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Returns at most `max` leading characters of `s`, used to keep device
/// identifiers out of logs.
pub fn truncate(s: &str, max: usize) -> &str {
  match s.char_indices().nth(max) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Parses an expiry given as a bare date (midnight UTC), a naive datetime or
/// an RFC 3339 timestamp.
pub fn parse_expiry(raw: &str) -> Option<DateTime> {
  let raw = raw.trim();

  if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
    return date.and_hms_opt(0, 0, 0);
  }

  for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
    if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
      return Some(dt);
    }
  }

  chrono::DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc())
}

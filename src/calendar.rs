use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::daily::DailyError;

const MAX_ZONE_LEN: usize = 64;

// Could this string be an IANA identifier at all? ("America/Argentina/Buenos_Aires", "Etc/GMT+5")
fn zone_shaped(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_ZONE_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-'))
}

// Caller's zone and its calendar date at `now`, missing or unknown zones use `fallback`
pub fn today_in(
    timezone: Option<&str>,
    fallback: Tz,
    now: DateTime<Utc>,
) -> Result<(NaiveDate, Tz), DailyError> {
    let tz = match timezone.map(str::trim) {
        None => fallback,
        Some(name) if !zone_shaped(name) => {
            return Err(DailyError::InvalidTimezone(name.to_string()));
        }
        Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            tracing::warn!(timezone = name, fallback = fallback.name(), "unknown timezone, using fallback");
            fallback
        }),
    };

    Ok((now.with_timezone(&tz).date_naive(), tz))
}

//! Clock and time-zone helpers.
//!
//! All wall-clock arithmetic happens in an explicit [`Tz`]; storage and
//! comparisons use UTC instants.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse an IANA zone name, falling back when it is empty or unknown.
pub fn resolve_timezone(name: &str, fallback: Tz) -> Tz {
    name.trim().parse::<Tz>().unwrap_or(fallback)
}

/// Convert a local wall-clock time to a UTC instant.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times that
/// fall inside a DST gap are shifted forward by the gap length, which matches
/// how most calendars render them.
pub fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(early, _) => Some(early.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(local + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

/// First and last second of `date` in `tz`, as UTC instants.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_to_utc(date.and_time(NaiveTime::MIN), tz)?;
    let last = NaiveTime::from_hms_opt(23, 59, 59)?;
    let end = local_to_utc(date.and_time(last), tz)?;
    Some((start, end))
}

/// Parse a client-supplied local date-time.
///
/// Accepts `YYYY-MM-DD HH:MM[:SS]`, the same with a `T` separator, or a full
/// RFC 3339 timestamp (whose offset wins over `tz`).
pub fn parse_local_datetime(input: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .and_then(|local| local_to_utc(local, tz))
}

use chrono::{DateTime, NaiveTime, SecondsFormat, TimeDelta, Utc};

/// Upper bound on the look-back window, keeps the store from being flooded.
pub const MAX_DAYS_TO_RETRIEVE: i32 = 30;

/// Start just before midnight so the 00:00:00 record falls inside the range.
const MIDNIGHT_MARGIN_SECS: i64 = 19;

/// Clamp a "last N days" request to `1..=MAX_DAYS_TO_RETRIEVE`.
///
/// One day means "today only"; zero and negative values are treated as one day.
pub fn clamp_days(days_to_retrieve: i32) -> i32 {
    days_to_retrieve.clamp(1, MAX_DAYS_TO_RETRIEVE)
}

/// Inclusive start of a "last N days" window ending now.
pub fn start_date(days_to_retrieve: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    days_back(clamp_days(days_to_retrieve) - 1, now)
}

/// Start of the price/temperature window: one day earlier than [`start_date`].
///
/// The store attributes the 00:00-01:00 hour to the previous day, so without the
/// extra day the first hour of the earliest requested day has no enrichment.
pub fn enrichment_start_date(days_to_retrieve: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    days_back(clamp_days(days_to_retrieve), now)
}

fn days_back(days: i32, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight - TimeDelta::days(i64::from(days)) - TimeDelta::seconds(MIDNIGHT_MARGIN_SECS)
}

/// Render an instant the way Flux `range()` expects it.
pub fn to_flux_time(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Both range starts needed for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub enrichment_start: DateTime<Utc>,
}

impl TimeRange {
    pub fn last_days(days_to_retrieve: i32, now: DateTime<Utc>) -> Self {
        Self {
            start: start_date(days_to_retrieve, now),
            enrichment_start: enrichment_start_date(days_to_retrieve, now),
        }
    }
}

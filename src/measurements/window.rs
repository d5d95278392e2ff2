use crate::error::AppError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static FLUX_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(ns|us|µs|ms|mo|s|m|h|d|w|y))+$").expect("duration pattern is valid")
});

/// Bucket width handed to Flux `aggregateWindow(every: ...)`, e.g. `15m` or `1h30m`.
///
/// Only plain Flux duration literals are accepted; the value is spliced into the
/// query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AggregateWindow(String);

impl AggregateWindow {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if !FLUX_DURATION.is_match(trimmed) {
            return Err(AppError::InvalidInput(format!(
                "invalid aggregation window '{}', expected a duration such as 15m or 1h",
                raw
            )));
        }
        if trimmed
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .all(|part| part.bytes().all(|b| b == b'0'))
        {
            return Err(AppError::InvalidInput(format!(
                "aggregation window '{}' must be longer than zero",
                raw
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The fixed hourly window prices are published in.
    pub fn hourly() -> Self {
        Self("60m".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AggregateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AggregateWindow {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AggregateWindow {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AggregateWindow> for String {
    fn from(window: AggregateWindow) -> Self {
        window.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_flux_durations() {
        for raw in ["15m", "1h", "60m", "1d", "30s", "1h30m", "2w", "1mo", "500ms"] {
            assert_eq!(AggregateWindow::parse(raw).unwrap().as_str(), raw);
        }
    }

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(AggregateWindow::parse(" 1h ").unwrap().as_str(), "1h");
    }

    #[test]
    fn test_rejects_garbage_and_injection() {
        for raw in [
            "",
            "15",
            "m",
            "15 minutes",
            "-5m",
            "1.5h",
            "1h, fn: max",
            "1h)\n  |> drop()",
        ] {
            assert!(
                matches!(AggregateWindow::parse(raw), Err(AppError::InvalidInput(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_rejects_zero_length() {
        assert!(AggregateWindow::parse("0m").is_err());
        assert!(AggregateWindow::parse("00h").is_err());
        assert!(AggregateWindow::parse("0h15m").is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: AggregateWindow = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(ok.as_str(), "1h");
        assert!(serde_json::from_str::<AggregateWindow>("\"soon\"").is_err());
    }

    #[test]
    fn test_hourly_window() {
        assert_eq!(AggregateWindow::hourly().as_str(), "60m");
    }
}

use super::SeriesQuery;
use crate::config::SourcesConfig;
use crate::measurements::time_range::to_flux_time;
use crate::measurements::AggregateWindow;
use std::fmt::Write;

/// Field names pivoted into one row for the net power calculation.
pub const POWER_CONSUMED_FIELD: &str = "power_consumed";
pub const POWER_PRODUCED_FIELD: &str = "power_produced";

/// Render the Flux text for one of the fixed query templates.
pub fn render(query: &SeriesQuery, sources: &SourcesConfig) -> String {
    match query {
        SeriesQuery::Power {
            start,
            signature,
            window,
        } => {
            let mut flux = range(&sources.meter_bucket, &to_flux_time(*start));
            filter(&mut flux, "signature", signature);
            let _ = writeln!(
                flux,
                "  |> filter(fn: (r) => r[\"_field\"] == {} or r[\"_field\"] == {})",
                quote(POWER_CONSUMED_FIELD),
                quote(POWER_PRODUCED_FIELD)
            );
            flux.push_str(
                "  |> pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\")\n",
            );
            let _ = writeln!(
                flux,
                "  |> map(fn: (r) => ({{r with _value: r.{} - r.{}}}))",
                POWER_CONSUMED_FIELD, POWER_PRODUCED_FIELD
            );
            aggregate(&mut flux, window, "mean");
            flux
        }
        SeriesQuery::Odometer {
            start,
            signature,
            sensor,
            window,
        } => {
            let mut flux = range(&sources.meter_bucket, &to_flux_time(*start));
            filter(&mut flux, "_field", sensor.field_name());
            filter(&mut flux, "signature", signature);
            aggregate(&mut flux, window, "min");
            flux
        }
        SeriesQuery::Price { start } => {
            let mut flux = range(&sources.enrichment_bucket, &to_flux_time(*start));
            filter(&mut flux, "entity_id", &sources.price_entity);
            if let Some(domain) = &sources.price_domain {
                filter(&mut flux, "domain", domain);
            }
            filter(&mut flux, "_field", &sources.price_field);
            aggregate(&mut flux, &AggregateWindow::hourly(), "mean");
            flux
        }
        SeriesQuery::Temperature { start, window } => {
            let mut flux = String::from("import \"interpolate\"\n\n");
            flux.push_str(&range(&sources.enrichment_bucket, &to_flux_time(*start)));
            filter(&mut flux, "entity_id", &sources.weather_entity);
            filter(&mut flux, "domain", &sources.weather_domain);
            filter(&mut flux, "_field", &sources.weather_field);
            let _ = writeln!(flux, "  |> interpolate.linear(every: {})", window);
            aggregate(&mut flux, window, "mean");
            flux
        }
    }
}

fn range(bucket: &str, start: &str) -> String {
    format!(
        "from(bucket: {})\n  |> range(start: {}, stop: now())\n",
        quote(bucket),
        start
    )
}

fn filter(flux: &mut String, column: &str, value: &str) {
    let _ = writeln!(
        flux,
        "  |> filter(fn: (r) => r[{}] == {})",
        quote(column),
        quote(value)
    );
}

fn aggregate(flux: &mut String, window: &AggregateWindow, function: &str) {
    let _ = writeln!(
        flux,
        "  |> aggregateWindow(every: {}, fn: {}, createEmpty: false)",
        window, function
    );
    let _ = write!(flux, "  |> yield(name: {})", quote(function));
}

/// Flux string literal with backslashes, quotes and interpolation markers escaped.
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::SensorKind;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn start() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 41).unwrap()
    }

    fn window(raw: &str) -> AggregateWindow {
        AggregateWindow::parse(raw).unwrap()
    }

    #[test]
    fn test_power_query() {
        let query = SeriesQuery::Power {
            start: start(),
            signature: "2019-ETI-EMON-V01-51821E-16405E".into(),
            window: window("15m"),
        };

        let expected = r#"from(bucket: "p1-smartmeters")
  |> range(start: 2024-01-14T23:59:41Z, stop: now())
  |> filter(fn: (r) => r["signature"] == "2019-ETI-EMON-V01-51821E-16405E")
  |> filter(fn: (r) => r["_field"] == "power_consumed" or r["_field"] == "power_produced")
  |> pivot(rowKey: ["_time"], columnKey: ["_field"], valueColumn: "_value")
  |> map(fn: (r) => ({r with _value: r.power_consumed - r.power_produced}))
  |> aggregateWindow(every: 15m, fn: mean, createEmpty: false)
  |> yield(name: "mean")"#;

        assert_eq!(render(&query, &SourcesConfig::default()), expected);
    }

    #[test]
    fn test_odometer_query_uses_min() {
        let query = SeriesQuery::Odometer {
            start: start(),
            signature: "SIG".into(),
            sensor: SensorKind::GasDelivered,
            window: window("1h"),
        };

        let expected = r#"from(bucket: "p1-smartmeters")
  |> range(start: 2024-01-14T23:59:41Z, stop: now())
  |> filter(fn: (r) => r["_field"] == "gas_delivered")
  |> filter(fn: (r) => r["signature"] == "SIG")
  |> aggregateWindow(every: 1h, fn: min, createEmpty: false)
  |> yield(name: "min")"#;

        assert_eq!(render(&query, &SourcesConfig::default()), expected);
    }

    #[test]
    fn test_price_query_is_always_hourly() {
        let flux = render(&SeriesQuery::Price { start: start() }, &SourcesConfig::default());

        assert!(flux.contains(r#"r["entity_id"] == "nordpool""#));
        assert!(flux.contains(r#"r["_field"] == "value""#));
        assert!(flux.contains("aggregateWindow(every: 60m, fn: mean, createEmpty: false)"));
        assert!(!flux.contains(r#"r["domain"]"#));
    }

    #[test]
    fn test_price_query_with_domain() {
        let sources = SourcesConfig {
            price_domain: Some("sensor".into()),
            ..SourcesConfig::default()
        };
        let flux = render(&SeriesQuery::Price { start: start() }, &sources);
        assert!(flux.contains(r#"r["domain"] == "sensor""#));
    }

    #[test]
    fn test_temperature_query_interpolates() {
        let query = SeriesQuery::Temperature {
            start: start(),
            window: window("15m"),
        };

        let expected = r#"import "interpolate"

from(bucket: "ha-playground")
  |> range(start: 2024-01-14T23:59:41Z, stop: now())
  |> filter(fn: (r) => r["entity_id"] == "forecast_sendlab_playground")
  |> filter(fn: (r) => r["domain"] == "weather")
  |> filter(fn: (r) => r["_field"] == "temperature")
  |> interpolate.linear(every: 15m)
  |> aggregateWindow(every: 15m, fn: mean, createEmpty: false)
  |> yield(name: "mean")"#;

        assert_eq!(render(&query, &SourcesConfig::default()), expected);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"a"b\c${x}"#), r#""a\"b\\c\${x}""#);
    }
}

use super::enrichment::{PriceSeries, TemperatureSeries};
use super::models::{RawSample, SensorKind};
use super::window::AggregateWindow;
use crate::error::Result;
use crate::store::{FluxRecord, SeriesQuery, TimeSeriesStore};
use chrono::{DateTime, Utc};

/// The power fields are stored in kilowatts; readings are reported in watts.
const KILOWATT_TO_WATT: f64 = 1000.0;

/// Tag holding the meter signature on meter rows.
const SIGNATURE_TAG: &str = "signature";

/// Raw meter samples of one candidate signature. Zero rows means "try the next
/// candidate", not an error.
pub async fn fetch_raw_samples(
    store: &dyn TimeSeriesStore,
    sensor: SensorKind,
    signature: &str,
    start: DateTime<Utc>,
    window: &AggregateWindow,
) -> Result<Vec<RawSample>> {
    let query = match sensor {
        SensorKind::Power => SeriesQuery::Power {
            start,
            signature: signature.to_string(),
            window: window.clone(),
        },
        _ => SeriesQuery::Odometer {
            start,
            signature: signature.to_string(),
            sensor,
            window: window.clone(),
        },
    };

    let scale = if sensor.is_odometer() {
        1.0
    } else {
        KILOWATT_TO_WATT
    };

    let records = store.run_range_query(&query).await?;
    Ok(records
        .into_iter()
        .map(|record| to_raw_sample(record, scale))
        .collect())
}

fn to_raw_sample(record: FluxRecord, scale: f64) -> RawSample {
    let location_id = record.tag(SIGNATURE_TAG).map(str::to_string);
    RawSample {
        time: record.time,
        location_id,
        value: record.value * scale,
    }
}

/// Hourly prices from `start`, always aggregated per 60 minutes.
pub async fn fetch_prices(store: &dyn TimeSeriesStore, start: DateTime<Utc>) -> Result<PriceSeries> {
    let records = store.run_range_query(&SeriesQuery::Price { start }).await?;
    Ok(PriceSeries::from_records(records))
}

/// Temperatures from `start`, interpolated to the requested window.
pub async fn fetch_temperatures(
    store: &dyn TimeSeriesStore,
    start: DateTime<Utc>,
    window: &AggregateWindow,
) -> Result<TemperatureSeries> {
    let query = SeriesQuery::Temperature {
        start,
        window: window.clone(),
    };
    let records = store.run_range_query(&query).await?;
    Ok(TemperatureSeries::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn window() -> AggregateWindow {
        AggregateWindow::parse("15m").unwrap()
    }

    #[tokio::test]
    async fn test_power_converted_to_watts() {
        let store = MemoryStore::new().with_power(
            "SIG",
            vec![FluxRecord::new(at(13, 45), 1.25).with_tag("signature", "SIG")],
        );

        let samples = fetch_raw_samples(&store, SensorKind::Power, "SIG", at(0, 0), &window())
            .await
            .unwrap();

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 1250.0);
        assert_eq!(samples[0].location_id.as_deref(), Some("SIG"));
    }

    #[tokio::test]
    async fn test_odometer_values_unscaled() {
        let store = MemoryStore::new().with_odometer(
            "SIG",
            SensorKind::EnergyConsumed,
            vec![FluxRecord::new(at(13, 45), 4521.7)],
        );

        let samples =
            fetch_raw_samples(&store, SensorKind::EnergyConsumed, "SIG", at(0, 0), &window())
                .await
                .unwrap();

        assert_eq!(samples[0].value, 4521.7);
        assert_eq!(samples[0].location_id, None);
    }

    #[tokio::test]
    async fn test_odometer_query_names_the_sensor_field() {
        let store = MemoryStore::new();

        let samples =
            fetch_raw_samples(&store, SensorKind::GasDelivered, "SIG", at(0, 0), &window())
                .await
                .unwrap();

        assert!(samples.is_empty());
        assert_eq!(
            store.issued_queries(),
            vec![SeriesQuery::Odometer {
                start: at(0, 0),
                signature: "SIG".into(),
                sensor: SensorKind::GasDelivered,
                window: window(),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_prices_and_temperatures() {
        let store = MemoryStore::new()
            .with_prices(vec![FluxRecord::new(at(13, 0), 0.25)])
            .with_temperatures(vec![FluxRecord::new(at(13, 45), 7.3)]);

        let prices = fetch_prices(&store, at(0, 0)).await.unwrap();
        let temperatures = fetch_temperatures(&store, at(0, 0), &window()).await.unwrap();

        assert_eq!(prices.price_at(at(13, 59)), 0.25);
        assert_eq!(temperatures.temperature_at(at(13, 45)), 7.3);
    }
}

use super::models::{RawSample, Reading, SensorKind};
use super::normalizer::round_to;
use crate::store::FluxRecord;
use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Decimal places kept for prices and temperatures at ingestion.
const PRICE_DECIMALS: i32 = 4;
const TEMPERATURE_DECIMALS: i32 = 1;

/// Floor an instant to the start of its hour.
pub fn truncate_to_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time)
}

/// Hourly prices keyed by the hour they are published for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    by_hour: HashMap<DateTime<Utc>, f64>,
}

impl PriceSeries {
    pub fn from_records(records: Vec<FluxRecord>) -> Self {
        Self {
            by_hour: index(records, PRICE_DECIMALS, "price"),
        }
    }

    /// Price of the hour `time` falls in, 0.0 when unknown.
    pub fn price_at(&self, time: DateTime<Utc>) -> f64 {
        self.by_hour
            .get(&truncate_to_hour(time))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_hour.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hour.is_empty()
    }
}

/// Interpolated temperatures keyed by their exact timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemperatureSeries {
    by_time: HashMap<DateTime<Utc>, f64>,
}

impl TemperatureSeries {
    pub fn from_records(records: Vec<FluxRecord>) -> Self {
        Self {
            by_time: index(records, TEMPERATURE_DECIMALS, "temperature"),
        }
    }

    /// Temperature at exactly `time`, 0.0 when unknown.
    pub fn temperature_at(&self, time: DateTime<Utc>) -> f64 {
        self.by_time.get(&time).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_time.is_empty()
    }
}

// First sample per timestamp wins.
fn index(records: Vec<FluxRecord>, decimals: i32, series: &str) -> HashMap<DateTime<Utc>, f64> {
    let mut map = HashMap::with_capacity(records.len());
    for record in records {
        if map.contains_key(&record.time) {
            debug!(time = %record.time, "duplicate {} sample ignored", series);
            continue;
        }
        map.insert(record.time, round_to(record.value, decimals));
    }
    map
}

/// Price and temperature context shared by every reading of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnrichmentSeries {
    pub prices: PriceSeries,
    pub temperatures: TemperatureSeries,
}

impl EnrichmentSeries {
    /// Attach price and temperature to each raw sample, in input order.
    pub fn join(&self, samples: Vec<RawSample>, sensor: SensorKind, signature: &str) -> Vec<Reading> {
        let unit = sensor.unit();
        samples
            .into_iter()
            .map(|sample| Reading {
                timestamp: sample.time,
                location_id: sample
                    .location_id
                    .unwrap_or_else(|| signature.to_string()),
                sensor,
                value: sample.value,
                unit,
                energy_price: self.prices.price_at(sample.time),
                temperature: self.temperatures.temperature_at(sample.time),
            })
            .collect()
    }
}

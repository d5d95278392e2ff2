use super::{FluxRecord, SeriesQuery, TimeSeriesStore};
use crate::error::{AppError, Result};
use crate::measurements::SensorKind;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SeriesKey {
    Power(String),
    Odometer(String, SensorKind),
    Price,
    Temperature,
}

impl From<&SeriesQuery> for SeriesKey {
    fn from(query: &SeriesQuery) -> Self {
        match query {
            SeriesQuery::Power { signature, .. } => SeriesKey::Power(signature.clone()),
            SeriesQuery::Odometer {
                signature, sensor, ..
            } => SeriesKey::Odometer(signature.clone(), *sensor),
            SeriesQuery::Price { .. } => SeriesKey::Price,
            SeriesQuery::Temperature { .. } => SeriesKey::Temperature,
        }
    }
}

/// In-memory store answering the fixed templates from canned rows.
///
/// Unknown series answer with zero rows. Every query is recorded so callers can
/// assert on what was asked.
#[derive(Debug, Default)]
pub struct MemoryStore {
    series: Mutex<HashMap<SeriesKey, Vec<FluxRecord>>>,
    issued: Mutex<Vec<SeriesQuery>>,
    failure: Mutex<Option<String>>,
    latency: Mutex<Option<Duration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(self, signature: &str, rows: Vec<FluxRecord>) -> Self {
        self.insert(SeriesKey::Power(signature.to_string()), rows)
    }

    pub fn with_odometer(self, signature: &str, sensor: SensorKind, rows: Vec<FluxRecord>) -> Self {
        self.insert(SeriesKey::Odometer(signature.to_string(), sensor), rows)
    }

    pub fn with_prices(self, rows: Vec<FluxRecord>) -> Self {
        self.insert(SeriesKey::Price, rows)
    }

    pub fn with_temperatures(self, rows: Vec<FluxRecord>) -> Self {
        self.insert(SeriesKey::Temperature, rows)
    }

    /// Answer every query with a data source error.
    pub fn failing(self, message: &str) -> Self {
        *lock(&self.failure) = Some(message.to_string());
        self
    }

    /// Delay every answer, for exercising deadlines.
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.latency) = Some(latency);
        self
    }

    fn insert(self, key: SeriesKey, rows: Vec<FluxRecord>) -> Self {
        lock(&self.series).insert(key, rows);
        self
    }

    pub fn issued_queries(&self) -> Vec<SeriesQuery> {
        lock(&self.issued).clone()
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn run_range_query(&self, query: &SeriesQuery) -> Result<Vec<FluxRecord>> {
        lock(&self.issued).push(query.clone());

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(message) = lock(&self.failure).clone() {
            return Err(AppError::DataSource(message));
        }

        Ok(lock(&self.series)
            .get(&SeriesKey::from(query))
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(lock(&self.failure).is_none())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

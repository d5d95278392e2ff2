use super::enrichment::{EnrichmentSeries, PriceSeries};
use super::fetchers::{fetch_prices, fetch_raw_samples, fetch_temperatures};
use super::identity::CandidateSet;
use super::models::{RawSample, Reading, SensorKind};
use super::normalizer::Normalizer;
use super::time_range::TimeRange;
use super::window::AggregateWindow;
use crate::error::{AppError, Result};
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Parameters of one readings request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingQuery {
    pub meter_id: u32,
    pub days_to_retrieve: i32,
    pub window: AggregateWindow,
    pub sensor: SensorKind,
}

/// Fetches meter readings and enriches them with price and temperature.
///
/// Holds no per-request state: every call builds its own lookup maps.
#[derive(Clone)]
pub struct MeasurementRepository {
    store: Arc<dyn TimeSeriesStore>,
    candidates: CandidateSet,
    normalizer: Normalizer,
    clock: fn() -> DateTime<Utc>,
}

impl MeasurementRepository {
    pub fn new(
        store: Arc<dyn TimeSeriesStore>,
        candidates: CandidateSet,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            store,
            candidates,
            normalizer,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used to anchor "last N days".
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.store.health_check().await
    }

    pub async fn get_power(
        &self,
        meter_id: u32,
        days_to_retrieve: i32,
        window: &str,
    ) -> Result<Vec<Reading>> {
        self.get_sensor(meter_id, days_to_retrieve, window, SensorKind::Power)
            .await
    }

    pub async fn get_energy_consumed(
        &self,
        meter_id: u32,
        days_to_retrieve: i32,
        window: &str,
    ) -> Result<Vec<Reading>> {
        self.get_sensor(meter_id, days_to_retrieve, window, SensorKind::EnergyConsumed)
            .await
    }

    pub async fn get_energy_produced(
        &self,
        meter_id: u32,
        days_to_retrieve: i32,
        window: &str,
    ) -> Result<Vec<Reading>> {
        self.get_sensor(meter_id, days_to_retrieve, window, SensorKind::EnergyProduced)
            .await
    }

    pub async fn get_gas_delivered(
        &self,
        meter_id: u32,
        days_to_retrieve: i32,
        window: &str,
    ) -> Result<Vec<Reading>> {
        self.get_sensor(meter_id, days_to_retrieve, window, SensorKind::GasDelivered)
            .await
    }

    async fn get_sensor(
        &self,
        meter_id: u32,
        days_to_retrieve: i32,
        window: &str,
        sensor: SensorKind,
    ) -> Result<Vec<Reading>> {
        let query = ReadingQuery {
            meter_id,
            days_to_retrieve,
            window: AggregateWindow::parse(window)?,
            sensor,
        };
        self.fetch_readings(&query, &CancellationToken::new()).await
    }

    /// Like [`fetch_readings`](Self::fetch_readings), cancelled once `timeout` elapses.
    pub async fn fetch_readings_with_deadline(
        &self,
        query: &ReadingQuery,
        timeout: Duration,
    ) -> Result<Vec<Reading>> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        };

        let result = self.fetch_readings(query, &cancel).await;
        timer.abort();
        result
    }

    /// Readings of the first candidate signature that has data, in store order.
    ///
    /// Returns an empty list when no candidate has data. Store failures and
    /// cancellation are errors and stop the candidate loop.
    pub async fn fetch_readings(
        &self,
        query: &ReadingQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<Reading>> {
        let started = Instant::now();
        let range = TimeRange::last_days(query.days_to_retrieve, (self.clock)());

        let (enrichment, found) = tokio::try_join!(
            self.fetch_enrichment(query, &range, cancel),
            self.fetch_first_candidate(query, &range, cancel),
        )?;

        let Some((signature, samples)) = found else {
            warn!(
                meter_id = query.meter_id,
                sensor = %query.sensor,
                candidates = self.candidates.len(),
                "No candidate signature returned data, the meter id is probably wrong"
            );
            return Ok(Vec::new());
        };

        let readings: Vec<Reading> = enrichment
            .join(samples, query.sensor, &signature)
            .into_iter()
            .map(|reading| self.normalizer.normalize(reading))
            .collect();

        info!(
            sensor = %query.sensor,
            signature = %signature,
            readings = readings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Readings fetched"
        );

        Ok(readings)
    }

    async fn fetch_first_candidate(
        &self,
        query: &ReadingQuery,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<Option<(String, Vec<RawSample>)>> {
        for signature in self.candidates.signatures(query.meter_id) {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            debug!(signature = %signature, sensor = %query.sensor, "Trying candidate signature");
            let samples = cancellable(
                cancel,
                fetch_raw_samples(
                    self.store.as_ref(),
                    query.sensor,
                    &signature,
                    range.start,
                    &query.window,
                ),
            )
            .await?;

            if !samples.is_empty() {
                debug!(signature = %signature, rows = samples.len(), "Candidate signature matched");
                return Ok(Some((signature, samples)));
            }
        }

        Ok(None)
    }

    async fn fetch_enrichment(
        &self,
        query: &ReadingQuery,
        range: &TimeRange,
        cancel: &CancellationToken,
    ) -> Result<EnrichmentSeries> {
        let store = self.store.as_ref();

        let prices = async {
            if query.sensor.needs_price() {
                fetch_prices(store, range.enrichment_start).await
            } else {
                Ok(PriceSeries::default())
            }
        };
        let temperatures = fetch_temperatures(store, range.enrichment_start, &query.window);

        let (prices, temperatures) =
            cancellable(cancel, async { tokio::try_join!(prices, temperatures) }).await?;

        debug!(
            prices = prices.len(),
            temperatures = temperatures.len(),
            "Enrichment series fetched"
        );

        Ok(EnrichmentSeries {
            prices,
            temperatures,
        })
    }
}

/// Race a store call against the caller's cancellation token.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurements::identity::full_signature;
    use crate::measurements::Unit;
    use crate::store::{FluxRecord, MemoryStore, SeriesQuery};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    const METER: u32 = 0x51821E;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 18, 0, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn repository(store: MemoryStore, macs: &[&str]) -> (Arc<MemoryStore>, MeasurementRepository) {
        let store = Arc::new(store);
        let candidates = CandidateSet::new(macs.iter().map(|m| m.to_string()).collect()).unwrap();
        let repo = MeasurementRepository::new(store.clone(), candidates, Normalizer::default())
            .with_clock(fixed_now);
        (store, repo)
    }

    fn query(sensor: SensorKind) -> ReadingQuery {
        ReadingQuery {
            meter_id: METER,
            days_to_retrieve: 1,
            window: AggregateWindow::parse("15m").unwrap(),
            sensor,
        }
    }

    #[tokio::test]
    async fn test_power_reading_enriched() {
        let sig = full_signature(METER, "AAAAAA");
        let store = MemoryStore::new()
            .with_power(
                &sig,
                vec![FluxRecord::new(at(13, 47), 2.5).with_tag("signature", sig.clone())],
            )
            .with_prices(vec![FluxRecord::new(at(13, 0), 0.25)])
            .with_temperatures(vec![FluxRecord::new(at(13, 47), 7.3)]);
        let (_, repo) = repository(store, &["AAAAAA"]);

        let readings = repo
            .fetch_readings(&query(SensorKind::Power), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            readings,
            vec![Reading {
                timestamp: at(13, 47),
                location_id: sig,
                sensor: SensorKind::Power,
                value: 2500.0,
                unit: Unit::Watt,
                energy_price: 0.25,
                temperature: 7.3,
            }]
        );
    }

    #[tokio::test]
    async fn test_first_candidate_with_rows_wins() {
        let second = full_signature(METER, "BBBBBB");
        let third = full_signature(METER, "CCCCCC");
        let store = MemoryStore::new()
            .with_odometer(
                &second,
                SensorKind::EnergyConsumed,
                vec![
                    FluxRecord::new(at(1, 0), 10.0),
                    FluxRecord::new(at(2, 0), 11.0),
                    FluxRecord::new(at(3, 0), 12.0),
                ],
            )
            .with_odometer(
                &third,
                SensorKind::EnergyConsumed,
                vec![FluxRecord::new(at(1, 0), 99.0)],
            );
        let (store, repo) = repository(store, &["AAAAAA", "BBBBBB", "CCCCCC"]);

        let readings = repo
            .fetch_readings(&query(SensorKind::EnergyConsumed), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(readings.len(), 3);
        assert!(readings.iter().all(|r| r.location_id == second));

        let tried: Vec<String> = store
            .issued_queries()
            .iter()
            .filter_map(|q| q.signature().map(str::to_string))
            .collect();
        assert_eq!(tried, vec![full_signature(METER, "AAAAAA"), second]);
    }

    #[tokio::test]
    async fn test_no_candidate_yields_empty_list() {
        let (_, repo) = repository(MemoryStore::new(), &["AAAAAA", "BBBBBB"]);

        let readings = repo
            .fetch_readings(&query(SensorKind::GasDelivered), &CancellationToken::new())
            .await
            .unwrap();

        assert!(readings.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_an_error_not_empty() {
        let (_, repo) = repository(MemoryStore::new().failing("connection refused"), &["AAAAAA"]);

        let err = repo
            .fetch_readings(&query(SensorKind::Power), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_gas_skips_price_fetch() {
        let (store, repo) = repository(MemoryStore::new(), &["AAAAAA"]);

        repo.fetch_readings(&query(SensorKind::GasDelivered), &CancellationToken::new())
            .await
            .unwrap();

        let kinds: Vec<&str> = store.issued_queries().iter().map(SeriesQuery::kind).collect();
        assert!(!kinds.contains(&"price"));
        assert!(kinds.contains(&"temperature"));
    }

    #[tokio::test]
    async fn test_enrichment_window_starts_a_day_earlier() {
        let (store, repo) = repository(MemoryStore::new(), &["AAAAAA"]);

        repo.fetch_readings(&query(SensorKind::Power), &CancellationToken::new())
            .await
            .unwrap();

        let issued = store.issued_queries();
        let start_of = |kind: &str| {
            issued
                .iter()
                .find(|q| q.kind() == kind)
                .map(SeriesQuery::start)
                .unwrap()
        };
        assert_eq!(start_of("power"), Utc.with_ymd_and_hms(2024, 1, 14, 23, 59, 41).unwrap());
        assert_eq!(start_of("price"), Utc.with_ymd_and_hms(2024, 1, 13, 23, 59, 41).unwrap());
        assert_eq!(start_of("temperature"), start_of("price"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_candidate_loop() {
        let (store, repo) = repository(MemoryStore::new(), &["AAAAAA", "BBBBBB"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = repo
            .fetch_readings(&query(SensorKind::Power), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert!(store.issued_queries().iter().all(|q| q.signature().is_none()));
    }

    #[tokio::test]
    async fn test_deadline_cancels_slow_store() {
        let store = MemoryStore::new().with_latency(Duration::from_secs(5));
        let (_, repo) = repository(store, &["AAAAAA"]);

        let err = repo
            .fetch_readings_with_deadline(&query(SensorKind::Power), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
    }

    #[tokio::test]
    async fn test_convenience_rejects_bad_window() {
        let (_, repo) = repository(MemoryStore::new(), &["AAAAAA"]);
        let err = repo.get_power(METER, 1, "soon").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}

pub mod flux;
pub mod influx;
pub mod memory;

use crate::config::SourcesConfig;
use crate::error::Result;
use crate::measurements::{AggregateWindow, SensorKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub use influx::InfluxStore;
pub use memory::MemoryStore;

/// The fixed query templates the engine is allowed to run.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesQuery {
    /// Net power (consumed minus produced) of one meter, averaged per window.
    Power {
        start: DateTime<Utc>,
        signature: String,
        window: AggregateWindow,
    },
    /// One cumulative counter of one meter, window minimum.
    Odometer {
        start: DateTime<Utc>,
        signature: String,
        sensor: SensorKind,
        window: AggregateWindow,
    },
    /// Hourly energy prices.
    Price { start: DateTime<Utc> },
    /// Outdoor temperature, linearly interpolated to the window.
    Temperature {
        start: DateTime<Utc>,
        window: AggregateWindow,
    },
}

impl SeriesQuery {
    pub fn kind(&self) -> &'static str {
        match self {
            SeriesQuery::Power { .. } => "power",
            SeriesQuery::Odometer { .. } => "odometer",
            SeriesQuery::Price { .. } => "price",
            SeriesQuery::Temperature { .. } => "temperature",
        }
    }

    pub fn signature(&self) -> Option<&str> {
        match self {
            SeriesQuery::Power { signature, .. } | SeriesQuery::Odometer { signature, .. } => {
                Some(signature)
            }
            SeriesQuery::Price { .. } | SeriesQuery::Temperature { .. } => None,
        }
    }

    /// Flux text of this query against the configured buckets.
    pub fn to_flux(&self, sources: &SourcesConfig) -> String {
        flux::render(self, sources)
    }

    pub fn start(&self) -> DateTime<Utc> {
        match self {
            SeriesQuery::Power { start, .. }
            | SeriesQuery::Odometer { start, .. }
            | SeriesQuery::Price { start }
            | SeriesQuery::Temperature { start, .. } => *start,
        }
    }
}

/// One decoded row of a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxRecord {
    pub time: DateTime<Utc>,
    pub value: f64,
    pub tags: BTreeMap<String, String>,
}

impl FluxRecord {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self {
            time,
            value,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Time-series store the engine reads from.
///
/// An empty result is a successful answer; errors are reserved for a store that
/// could not be asked.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn run_range_query(&self, query: &SeriesQuery) -> Result<Vec<FluxRecord>>;

    async fn health_check(&self) -> Result<bool>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

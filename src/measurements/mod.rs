pub mod enrichment;
pub mod fetchers;
pub mod identity;
pub mod models;
pub mod normalizer;
pub mod repository;
pub mod time_range;
pub mod window;

pub use enrichment::{EnrichmentSeries, PriceSeries, TemperatureSeries};
pub use identity::{full_signature, CandidateSet, SIGNATURE_PREFIX};
pub use models::{RawSample, Reading, SensorKind, Unit};
pub use normalizer::{Normalizer, DEFAULT_GAS_PRICE};
pub use repository::{MeasurementRepository, ReadingQuery};
pub use time_range::{TimeRange, MAX_DAYS_TO_RETRIEVE};
pub use window::AggregateWindow;

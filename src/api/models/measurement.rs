use crate::measurements::{Reading, SensorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResponse {
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
    pub sensor: SensorKind,
    pub value: f64,
    pub unit: String,
    pub energy_price: f64,
    pub temperature: f64,
}

impl From<Reading> for MeasurementResponse {
    fn from(reading: Reading) -> Self {
        Self {
            timestamp: reading.timestamp,
            location_id: reading.location_id,
            sensor: reading.sensor,
            value: reading.value,
            unit: reading.unit.symbol().to_string(),
            energy_price: reading.energy_price,
            temperature: reading.temperature,
        }
    }
}

/// Query string shared by the measurement and chart endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeasurementParams {
    pub days: Option<i32>,
    pub window: Option<String>,
    pub meter_id: Option<u32>,
}

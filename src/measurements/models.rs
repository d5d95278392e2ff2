use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Power,
    EnergyConsumed,
    EnergyProduced,
    GasDelivered,
}

impl SensorKind {
    pub const ALL: [SensorKind; 4] = [
        SensorKind::Power,
        SensorKind::EnergyConsumed,
        SensorKind::EnergyProduced,
        SensorKind::GasDelivered,
    ];

    /// Field name of the sensor in the meter bucket.
    pub fn field_name(&self) -> &'static str {
        match self {
            SensorKind::Power => "power",
            SensorKind::EnergyConsumed => "energy_consumed",
            SensorKind::EnergyProduced => "energy_produced",
            SensorKind::GasDelivered => "gas_delivered",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            SensorKind::Power => Unit::Watt,
            SensorKind::EnergyConsumed | SensorKind::EnergyProduced => Unit::KilowattHour,
            SensorKind::GasDelivered => Unit::CubicMeter,
        }
    }

    /// Cumulative counters, aggregated with `min` instead of `mean`.
    pub fn is_odometer(&self) -> bool {
        !matches!(self, SensorKind::Power)
    }

    /// Gas readings carry a fixed tariff, so the hourly price series is not needed.
    pub fn needs_price(&self) -> bool {
        !matches!(self, SensorKind::GasDelivered)
    }

    pub fn title(&self) -> &'static str {
        match self {
            SensorKind::Power => "Power",
            SensorKind::EnergyConsumed => "Energy consumed",
            SensorKind::EnergyProduced => "Energy produced",
            SensorKind::GasDelivered => "Gas delivered",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for SensorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.field_name() == s)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "unknown sensor '{}', expected one of power, energy_consumed, energy_produced, gas_delivered",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Watt,
    KilowattHour,
    CubicMeter,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Watt => "W",
            Unit::KilowattHour => "kWh",
            Unit::CubicMeter => "m³",
        }
    }
}

/// One sample as returned by the meter bucket, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub time: DateTime<Utc>,
    /// Signature tag on the row, when the store returned one.
    pub location_id: Option<String>,
    pub value: f64,
}

/// A meter reading with its price and temperature context attached.
///
/// `energy_price` and `temperature` are 0.0 when no matching sample existed.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub location_id: String,
    pub sensor: SensorKind,
    pub value: f64,
    pub unit: Unit,
    pub energy_price: f64,
    pub temperature: f64,
}

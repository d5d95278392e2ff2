use super::models::{Reading, SensorKind};

/// Fallback gas tariff per cubic meter.
pub const DEFAULT_GAS_PRICE: f64 = 1.376;

const GAS_DECIMALS: i32 = 3;
const ENERGY_DECIMALS: i32 = 0;

/// Round to `decimals` places, halves away from zero.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Per-sensor precision and tariff rules applied after enrichment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizer {
    gas_price: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_GAS_PRICE)
    }
}

impl Normalizer {
    pub fn new(gas_price: f64) -> Self {
        Self { gas_price }
    }

    pub fn gas_price(&self) -> f64 {
        self.gas_price
    }

    pub fn normalize(&self, mut reading: Reading) -> Reading {
        match reading.sensor {
            SensorKind::GasDelivered => {
                reading.value = round_to(reading.value, GAS_DECIMALS);
                reading.energy_price = self.gas_price;
            }
            SensorKind::EnergyConsumed | SensorKind::EnergyProduced => {
                reading.value = round_to(reading.value, ENERGY_DECIMALS);
            }
            // converted to watts by the fetcher, kept at full precision
            SensorKind::Power => {}
        }
        reading
    }
}

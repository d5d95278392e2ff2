use super::measurement::MeasurementParams;
use crate::error::{AppError, Result};
use crate::measurements::normalizer::round_to;
use crate::measurements::{Reading, SensorKind};
use serde::{Deserialize, Serialize};

const LABEL_FORMAT: &str = "%d-%m %H:%M";
const TIME_AXIS: &str = "Time";

/// Second series drawn next to the sensor values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Overlay {
    #[default]
    Temperature,
    Price,
}

impl Overlay {
    fn label(&self) -> &'static str {
        match self {
            Overlay::Temperature => "Temperature (°C)",
            Overlay::Price => "Energy price (per unit)",
        }
    }

    fn value(&self, reading: &Reading) -> f64 {
        match self {
            Overlay::Temperature => reading.temperature,
            Overlay::Price => reading.energy_price,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartParams {
    pub days: Option<i32>,
    pub window: Option<String>,
    pub meter_id: Option<u32>,
    pub overlay: Option<Overlay>,
}

impl ChartParams {
    pub fn measurement(&self) -> MeasurementParams {
        MeasurementParams {
            days: self.days,
            window: self.window.clone(),
            meter_id: self.meter_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChartData {
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub labels: Vec<String>,
    pub dataset1_label: String,
    pub dataset1_data: Vec<f64>,
    pub dataset2_label: String,
    pub dataset2_data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarChartData {
    pub title: String,
    pub x_axis_label: String,
    pub y_axis_label: String,
    pub labels: Vec<String>,
    pub dataset_label: String,
    pub data: Vec<f64>,
}

fn value_label(sensor: SensorKind) -> String {
    format!("{} ({})", sensor.title(), sensor.unit().symbol())
}

fn time_label(reading: &Reading) -> String {
    reading.timestamp.format(LABEL_FORMAT).to_string()
}

impl LineChartData {
    pub fn from_readings(sensor: SensorKind, readings: &[Reading], overlay: Overlay) -> Self {
        Self {
            title: sensor.title().to_string(),
            x_axis_label: TIME_AXIS.to_string(),
            y_axis_label: value_label(sensor),
            labels: readings.iter().map(time_label).collect(),
            dataset1_label: value_label(sensor),
            dataset1_data: readings.iter().map(|r| r.value).collect(),
            dataset2_label: overlay.label().to_string(),
            dataset2_data: readings.iter().map(|r| overlay.value(r)).collect(),
        }
    }
}

/// Precision of per-window usage; power has no usage.
pub fn usage_decimals(sensor: SensorKind) -> Result<i32> {
    match sensor {
        SensorKind::Power => Err(AppError::InvalidInput(
            "usage is only defined for cumulative sensors, not power".to_string(),
        )),
        SensorKind::GasDelivered => Ok(3),
        SensorKind::EnergyConsumed | SensorKind::EnergyProduced => Ok(0),
    }
}

impl BarChartData {
    /// Usage per window: the increase of an odometer between consecutive readings.
    ///
    /// Each bar is labelled with the later reading of its pair.
    pub fn usage(sensor: SensorKind, readings: &[Reading]) -> Result<Self> {
        let decimals = usage_decimals(sensor)?;

        let (labels, data) = readings
            .windows(2)
            .map(|pair| {
                (
                    time_label(&pair[1]),
                    round_to(pair[1].value - pair[0].value, decimals),
                )
            })
            .unzip();

        Ok(Self {
            title: format!("{} per window", sensor.title()),
            x_axis_label: TIME_AXIS.to_string(),
            y_axis_label: sensor.unit().symbol().to_string(),
            labels,
            dataset_label: value_label(sensor),
            data,
        })
    }
}

pub mod chart;
pub mod measurement;

pub use chart::{BarChartData, ChartParams, LineChartData, Overlay};
pub use measurement::{MeasurementParams, MeasurementResponse};

pub mod charts;
pub mod health;
pub mod measurements;

use crate::config::Config;
use crate::measurements::MeasurementRepository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repository: MeasurementRepository,
    pub config: Arc<Config>,
}

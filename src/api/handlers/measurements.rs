use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::time::Duration;

use super::AppState;
use crate::{
    api::models::{MeasurementParams, MeasurementResponse},
    error::Result,
    measurements::{AggregateWindow, Reading, ReadingQuery, SensorKind},
};

/// Resolve path and query parameters against the configured defaults.
pub(crate) fn reading_query(
    state: &AppState,
    sensor: &str,
    params: &MeasurementParams,
) -> Result<ReadingQuery> {
    let api = &state.config.api;
    let window = params.window.as_deref().unwrap_or(&api.default_window);

    Ok(ReadingQuery {
        meter_id: params.meter_id.unwrap_or(state.config.meter.meter_id),
        days_to_retrieve: params.days.unwrap_or(api.default_days),
        window: AggregateWindow::parse(window)?,
        sensor: sensor.parse::<SensorKind>()?,
    })
}

/// Run a query under the configured request deadline.
pub(crate) async fn load_readings(state: &AppState, query: &ReadingQuery) -> Result<Vec<Reading>> {
    let timeout = Duration::from_secs(state.config.api.request_timeout_secs);
    state
        .repository
        .fetch_readings_with_deadline(query, timeout)
        .await
}

/// GET /api/v1/measurements/{sensor}
/// Enriched readings of the last `days` days, oldest first
pub async fn get_measurements(
    State(state): State<AppState>,
    Path(sensor): Path<String>,
    Query(params): Query<MeasurementParams>,
) -> Result<Json<Vec<MeasurementResponse>>> {
    let query = reading_query(&state, &sensor, &params)?;
    let readings = load_readings(&state, &query).await?;

    Ok(Json(
        readings.into_iter().map(MeasurementResponse::from).collect(),
    ))
}

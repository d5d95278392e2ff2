use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::measurements::{load_readings, reading_query};
use super::AppState;
use crate::{
    api::models::{
        chart::usage_decimals, BarChartData, ChartParams, LineChartData, MeasurementParams,
    },
    error::Result,
};

/// GET /api/v1/charts/{sensor}
/// Sensor values with a temperature or price overlay
pub async fn get_line_chart(
    State(state): State<AppState>,
    Path(sensor): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Json<LineChartData>> {
    let query = reading_query(&state, &sensor, &params.measurement())?;
    let readings = load_readings(&state, &query).await?;

    Ok(Json(LineChartData::from_readings(
        query.sensor,
        &readings,
        params.overlay.unwrap_or_default(),
    )))
}

/// GET /api/v1/charts/{sensor}/usage
/// Consumption per window for cumulative sensors
pub async fn get_usage_chart(
    State(state): State<AppState>,
    Path(sensor): Path<String>,
    Query(params): Query<MeasurementParams>,
) -> Result<Json<BarChartData>> {
    let query = reading_query(&state, &sensor, &params)?;
    usage_decimals(query.sensor)?;

    let readings = load_readings(&state, &query).await?;
    Ok(Json(BarChartData::usage(query.sensor, &readings)?))
}

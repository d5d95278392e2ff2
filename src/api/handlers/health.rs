use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use super::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let mut response = json!({
        "status": "ok",
        "influxdb": {
            "connected": false,
        }
    });

    match state.repository.health_check().await {
        Ok(connected) => {
            response["influxdb"]["connected"] = json!(connected);
        }
        Err(e) => {
            response["influxdb"]["error"] = json!(format!("InfluxDB error: {}", e));
        }
    }

    let status = if response["influxdb"]["connected"].as_bool().unwrap_or(false) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

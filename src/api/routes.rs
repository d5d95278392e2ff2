use crate::api::handlers::{charts, health, measurements, AppState};
use axum::{extract::Request, routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing::Level;

pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(health::health_check));

    let api_routes = Router::new()
        .route(
            "/api/v1/measurements/{sensor}",
            get(measurements::get_measurements),
        )
        .route("/api/v1/charts/{sensor}", get(charts::get_line_chart))
        .route("/api/v1/charts/{sensor}/usage", get(charts::get_usage_chart));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|_request: &Request, _span: &tracing::Span| {
                    tracing::event!(Level::DEBUG, "received request");
                })
                .on_response(
                    |response: &axum::response::Response,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(
                            Level::INFO,
                            status = response.status().as_u16(),
                            latency = ?latency,
                            "request completed"
                        );
                    },
                )
                .on_failure(
                    |error: tower_http::classify::ServerErrorsFailureClass,
                     _latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::event!(Level::ERROR, error = %error, "request failed");
                    },
                ),
        )
}

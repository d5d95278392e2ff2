use super::{FluxRecord, SeriesQuery, TimeSeriesStore};
use crate::config::{InfluxConfig, SourcesConfig};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Columns every Flux table carries that are not tags.
const SYSTEM_COLUMNS: [&str; 7] = ["", "result", "table", "_start", "_stop", "_time", "_value"];

/// InfluxDB 2.x query API client.
#[derive(Clone)]
pub struct InfluxStore {
    base_url: String,
    token: String,
    org: String,
    sources: SourcesConfig,
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl InfluxStore {
    pub fn new(config: &InfluxConfig, sources: SourcesConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            sources,
            client,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// Run raw Flux text and decode the CSV answer.
    pub async fn query_flux(&self, flux: &str) -> Result<Vec<FluxRecord>> {
        let url = format!("{}/api/v2/query", self.base_url);
        trace!("Flux query:\n{}", flux);

        let body = json!({
            "query": flux,
            "type": "flux",
            "dialect": {
                "header": true,
                "delimiter": ",",
                "annotations": [],
            },
        });

        let response = self
            .retry_request(|| async {
                self.client
                    .post(&url)
                    .query(&[("org", self.org.as_str())])
                    .header(header::AUTHORIZATION, format!("Token {}", self.token))
                    .header(header::ACCEPT, "application/csv")
                    .json(&body)
                    .send()
                    .await
            })
            .await?;

        match response.status() {
            status if status.is_success() => {
                let text = response.text().await?;
                let records = decode_csv(&text)?;
                debug!(rows = records.len(), "InfluxDB query answered");
                Ok(records)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                error!("InfluxDB rejected the token for org {}", self.org);
                Err(AppError::DataSource(
                    "authentication rejected by InfluxDB".to_string(),
                ))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                error!("InfluxDB query failed with status {}: {}", status, error_text);
                Err(AppError::DataSource(format!(
                    "InfluxDB answered {}: {}",
                    status.as_u16(),
                    error_text
                )))
            }
        }
    }

    /// Retry transport failures with exponential backoff. HTTP error statuses are
    /// answers and are not retried.
    async fn retry_request<F, Fut>(&self, mut request_fn: F) -> Result<reqwest::Response>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = std::result::Result<reqwest::Response, reqwest::Error>>,
    {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            match request_fn().await {
                Ok(response) => return Ok(response),
                Err(e) if attempts >= self.max_retries => {
                    error!("InfluxDB request failed after {} attempts: {}", attempts, e);
                    return Err(AppError::Http(e));
                }
                Err(e) => {
                    warn!(
                        "InfluxDB request failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempts, self.max_retries, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn run_range_query(&self, query: &SeriesQuery) -> Result<Vec<FluxRecord>> {
        self.query_flux(&query.to_flux(&self.sources)).await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "influxdb"
    }
}

enum Layout {
    Table {
        time: usize,
        value: usize,
        tags: Vec<(usize, String)>,
    },
    Error {
        message: usize,
    },
}

impl Layout {
    fn from_header(header: &csv::StringRecord) -> Option<Self> {
        let position = |name: &str| header.iter().position(|column| column == name);

        if let (Some(time), Some(value)) = (position("_time"), position("_value")) {
            let tags = header
                .iter()
                .enumerate()
                .filter(|(_, column)| !SYSTEM_COLUMNS.contains(column))
                .map(|(idx, column)| (idx, column.to_string()))
                .collect();
            return Some(Layout::Table { time, value, tags });
        }

        if header.get(0) == Some("error") {
            return Some(Layout::Error { message: 0 });
        }

        None
    }
}

/// Decode an un-annotated Flux CSV response.
///
/// Every table starts with its own header row; tables may have different columns.
/// Rows without a `_value` are skipped.
pub fn decode_csv(body: &str) -> Result<Vec<FluxRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut layout: Option<Layout> = None;
    let mut records = Vec::new();

    for row in reader.records() {
        let row = row?;

        if row.iter().all(str::is_empty) || row.get(0).is_some_and(|f| f.starts_with('#')) {
            continue;
        }

        if let Some(next) = Layout::from_header(&row) {
            layout = Some(next);
            continue;
        }

        match &layout {
            Some(Layout::Table { time, value, tags }) => {
                let raw_value = row.get(*value).unwrap_or_default();
                if raw_value.is_empty() {
                    continue;
                }
                let value: f64 = raw_value.parse().map_err(|_| {
                    AppError::Decode(format!("_value is not a number: {}", raw_value))
                })?;

                let raw_time = row.get(*time).unwrap_or_default();
                let time = DateTime::parse_from_rfc3339(raw_time)
                    .map_err(|e| AppError::Decode(format!("bad _time '{}': {}", raw_time, e)))?
                    .with_timezone(&Utc);

                let tags: BTreeMap<String, String> = tags
                    .iter()
                    .filter_map(|(idx, name)| {
                        row.get(*idx)
                            .filter(|v| !v.is_empty())
                            .map(|v| (name.clone(), v.to_string()))
                    })
                    .collect();

                records.push(FluxRecord { time, value, tags });
            }
            Some(Layout::Error { message }) => {
                let message = row.get(*message).unwrap_or("unknown error").to_string();
                return Err(AppError::DataSource(format!(
                    "InfluxDB reported a query error: {}",
                    message
                )));
            }
            None => {
                return Err(AppError::Decode(
                    "data row before any header row".to_string(),
                ));
            }
        }
    }

    Ok(records)
}

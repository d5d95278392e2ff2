use crate::error::{AppError, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\(([A-Za-z_][A-Za-z0-9_]*)\)|\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    pub influxdb: InfluxConfig,
    #[serde(default)]
    pub meter: MeterConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub tariffs: TariffConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_days")]
    pub default_days: i32,
    #[serde(default = "default_window")]
    pub default_window: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            request_timeout_secs: default_request_timeout_secs(),
            default_days: default_days(),
            default_window: default_window(),
        }
    }
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_days() -> i32 {
    1
}

fn default_window() -> String {
    "15m".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub org: String,
    #[serde(default = "default_influx_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_influx_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterConfig {
    /// Decimal form of the hexadecimal P1 meter id.
    #[serde(default = "default_meter_id")]
    pub meter_id: u32,
    /// Wifi-unit manufacturer identifiers, tried in order.
    #[serde(default = "default_manufacturer_macs")]
    pub manufacturer_macs: Vec<String>,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            meter_id: default_meter_id(),
            manufacturer_macs: default_manufacturer_macs(),
        }
    }
}

fn default_meter_id() -> u32 {
    5_341_726
}

fn default_manufacturer_macs() -> Vec<String> {
    ["16405E", "144068", "164068", "1640EF", "1640D8"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Buckets and tag filters the query templates select from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_meter_bucket")]
    pub meter_bucket: String,
    #[serde(default = "default_enrichment_bucket")]
    pub enrichment_bucket: String,
    #[serde(default = "default_price_entity")]
    pub price_entity: String,
    #[serde(default)]
    pub price_domain: Option<String>,
    #[serde(default = "default_price_field")]
    pub price_field: String,
    #[serde(default = "default_weather_entity")]
    pub weather_entity: String,
    #[serde(default = "default_weather_domain")]
    pub weather_domain: String,
    #[serde(default = "default_weather_field")]
    pub weather_field: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            meter_bucket: default_meter_bucket(),
            enrichment_bucket: default_enrichment_bucket(),
            price_entity: default_price_entity(),
            price_domain: None,
            price_field: default_price_field(),
            weather_entity: default_weather_entity(),
            weather_domain: default_weather_domain(),
            weather_field: default_weather_field(),
        }
    }
}

fn default_meter_bucket() -> String {
    "p1-smartmeters".into()
}

fn default_enrichment_bucket() -> String {
    "ha-playground".into()
}

fn default_price_entity() -> String {
    "nordpool".into()
}

fn default_price_field() -> String {
    "value".into()
}

fn default_weather_entity() -> String {
    "forecast_sendlab_playground".into()
}

fn default_weather_domain() -> String {
    "weather".into()
}

fn default_weather_field() -> String {
    "temperature".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Fixed price per cubic meter applied to every gas reading.
    #[serde(default = "default_gas_price")]
    pub gas_price: f64,
}

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            gas_price: default_gas_price(),
        }
    }
}

fn default_gas_price() -> f64 {
    1.376
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, apply env
    /// overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading configuration from: {}", path.display());

        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let expanded = expand_env_placeholders(raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("INFLUXDB_URL") {
            self.influxdb.url = url;
        }
        if let Ok(token) = std::env::var("INFLUXDB_TOKEN") {
            self.influxdb.token = token;
        }
        if let Ok(org) = std::env::var("INFLUXDB_ORG") {
            self.influxdb.org = org;
        }
        if let Ok(meter_id) = std::env::var("METER_ID") {
            self.meter.meter_id = meter_id.parse().map_err(|_| {
                AppError::Config(format!("METER_ID is not a valid meter id: {}", meter_id))
            })?;
        }
        Ok(())
    }

    /// Reject configurations the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("influxdb.url", &self.influxdb.url),
            ("influxdb.token", &self.influxdb.token),
            ("influxdb.org", &self.influxdb.org),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "{} not configured, set it in the config file or environment",
                    key
                )));
            }
        }

        if !self.influxdb.url.starts_with("http://") && !self.influxdb.url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "influxdb.url must be an http(s) URL, got {}",
                self.influxdb.url
            )));
        }

        if self.meter.manufacturer_macs.is_empty() {
            return Err(AppError::Config(
                "meter.manufacturer_macs cannot be empty".to_string(),
            ));
        }

        if self.api.port == 0 {
            return Err(AppError::Config("api.port cannot be 0".to_string()));
        }

        if self.api.request_timeout_secs == 0 {
            return Err(AppError::Config(
                "api.request_timeout_secs cannot be 0".to_string(),
            ));
        }

        crate::measurements::AggregateWindow::parse(&self.api.default_window)
            .map_err(|e| AppError::Config(format!("api.default_window: {}", e)))?;

        Ok(())
    }

    pub fn api_bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" is an escaped dollar sign.
fn expand_env_placeholders(input: &str) -> Result<String> {
    let mut missing = None;

    let expanded = PLACEHOLDER.replace_all(input, |caps: &Captures| {
        let Some(var) = caps.get(1).or_else(|| caps.get(2)) else {
            return "$".to_string();
        };
        match std::env::var(var.as_str()) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| var.as_str().to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(var) => Err(AppError::Config(format!(
            "missing environment variable: {}",
            var
        ))),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
influxdb:
  url: http://influx.local:8086
  token: secret
  org: home
"#;

    #[test]
    fn test_expand_env_placeholders() {
        std::env::set_var("SMART_ENERGY_TEST_TOKEN", "abc123");

        let output =
            expand_env_placeholders("a: $(SMART_ENERGY_TEST_TOKEN)\nb: ${SMART_ENERGY_TEST_TOKEN}")
                .unwrap();
        assert_eq!(output, "a: abc123\nb: abc123");

        std::env::remove_var("SMART_ENERGY_TEST_TOKEN");
    }

    #[test]
    fn test_expand_env_placeholders_escape() {
        let output = expand_env_placeholders("price: $$5").unwrap();
        assert_eq!(output, "price: $5");
    }

    #[test]
    fn test_expand_env_placeholders_missing() {
        let result = expand_env_placeholders("token: $(SMART_ENERGY_SURELY_UNSET_VAR)");
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("SMART_ENERGY_SURELY_UNSET_VAR")));
    }

    #[test]
    fn test_defaults_applied() {
        let cfg: Config = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.api.port, 8080);
        assert_eq!(cfg.api.default_window, "15m");
        assert_eq!(cfg.meter.meter_id, 5_341_726);
        assert_eq!(cfg.meter.manufacturer_macs.len(), 5);
        assert_eq!(cfg.meter.manufacturer_macs[0], "16405E");
        assert_eq!(cfg.sources.meter_bucket, "p1-smartmeters");
        assert_eq!(cfg.tariffs.gas_price, 1.376);
    }

    #[test]
    fn test_validate_rejects_missing_token() {
        let mut cfg: Config = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.influxdb.token = "  ".into();

        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, AppError::Config(msg) if msg.contains("influxdb.token")));
    }

    #[test]
    fn test_validate_rejects_empty_candidates() {
        let mut cfg: Config = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.meter.manufacturer_macs.clear();

        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_default_window() {
        let mut cfg: Config = serde_yaml::from_str(MINIMAL).unwrap();
        cfg.api.default_window = "15 minutes".into();

        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_influx_section_fails() {
        let result: std::result::Result<Config, _> = serde_yaml::from_str("api:\n  port: 9000\n");
        assert!(result.is_err());
    }
}

use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::domain::session::Session;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub metrics_listen_addr: Option<String>,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_page_size() -> u32 {
    20
}

fn default_telemetry_service_name() -> String {
    "business-notifications".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default())
    }

    fn from_source(source: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured session, if user, tenant and token are all set.
    pub fn session(&self) -> Option<Session> {
        let non_empty = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

        Some(Session::new(
            non_empty(&self.user_id)?,
            non_empty(&self.tenant_id)?,
            non_empty(&self.access_token)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut map = config::Map::new();
        for (k, v) in vars {
            map.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_source(Environment::default().source(Some(map)))
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("API_BASE_URL", "https://erp.example.com/api")]).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.page_size, 20);
        assert!(!config.telemetry_enabled);
        assert!(config.metrics_listen_addr.is_none());
        assert!(config.session().is_none());
    }

    #[test]
    fn test_overrides_and_session() {
        let config = load(&[
            ("API_BASE_URL", "https://erp.example.com/api"),
            ("POLL_INTERVAL_SECS", "5"),
            ("USER_ID", "u-9"),
            ("TENANT_ID", "acme"),
            ("ACCESS_TOKEN", "jwt"),
            ("TELEMETRY_ENABLED", "true"),
        ])
        .unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.telemetry_enabled);
        let session = config.session().unwrap();
        assert_eq!(session.tenant_id, "acme");
    }

    #[test]
    fn test_blank_tenant_means_no_session() {
        let config = load(&[
            ("API_BASE_URL", "https://erp.example.com/api"),
            ("USER_ID", "u-9"),
            ("TENANT_ID", " "),
            ("ACCESS_TOKEN", "jwt"),
        ])
        .unwrap();

        assert!(config.session().is_none());
    }

    #[test]
    fn test_missing_base_url_is_an_error() {
        assert!(load(&[]).is_err());
    }
}

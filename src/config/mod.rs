use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::proxy::CatchupPolicy;
use crate::utils::url::is_http_url;

/// Mirrors the production deployment talks to, in registry order.
pub const DEFAULT_MIRRORS: [&str; 8] = [
    "https://ver.tele.com.ar",
    "https://stv.supportinternet.com.ar",
    "https://play.conectarservicios.com.ar",
    "https://tv.is.com.ar",
    "https://davitelplay.davitel.com.ar",
    "https://iptelplay.com.ar",
    "https://olatv.com.ar",
    "https://play.xg.ar",
];

/// Prefix for environment overrides, e.g. `EPG_RELAY__WEB__PORT=9000`
pub const ENV_PREFIX: &str = "EPG_RELAY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub upstream: UpstreamConfig,
    pub fetch: FetchConfig,
    pub refresh: RefreshConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL, or `memory` for a process-local store
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub mirrors: Vec<String>,
    pub login_url: String,
    pub channel_list_path: String,
    /// `{channel_id}` and `{tenant_id}` are substituted per request
    pub epg_path_template: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_attempts_per_mirror: u32,
    pub global_attempt_ceiling: u32,
    pub request_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub inter_channel_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub tenant_id: String,
    /// Six-field cron expression; no scheduled refresh when unset
    pub cron: Option<String>,
    pub workers: Option<usize>,
    pub sync_channels_before_refresh: bool,
    pub run_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub json_catchup: CatchupPolicy,
    pub xmltv_catchup: CatchupPolicy,
    pub all_cache_max_age_secs: u64,
    pub channel_cache_max_age_secs: u64,
    pub generator_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./epg-relay.db".to_string(),
            max_connections: Some(10),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            login_url: "https://stv.supportinternet.com.ar/sb/login".to_string(),
            channel_list_path: "/sb/channel/all?vf=dash&visibilityRights=PREVIEW".to_string(),
            epg_path_template: "/sb/public/epg/channel/{channel_id}?tenantId={tenant_id}"
                .to_string(),
            username: None,
            password: None,
            tenant_id: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts_per_mirror: 5,
            global_attempt_ceiling: 120,
            request_timeout_ms: 5000,
            backoff_base_ms: 300,
            inter_channel_delay_ms: 100,
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tenant_id: "1".to_string(),
            cron: None,
            workers: None,
            sync_channels_before_refresh: false,
            run_on_startup: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_catchup: CatchupPolicy::Keep,
            xmltv_catchup: CatchupPolicy::Keep,
            all_cache_max_age_secs: 3600,
            channel_cache_max_age_secs: 300,
            generator_name: "epg-relay".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn inter_channel_delay(&self) -> Duration {
        Duration::from_millis(self.inter_channel_delay_ms)
    }
}

impl Config {
    /// Load configuration from `CONFIG_FILE` (default `config.toml`) layered
    /// with `EPG_RELAY__*` environment variables.
    ///
    /// A missing file is created with the default configuration.
    pub fn load() -> AppResult<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_file).exists() {
            let contents = toml::to_string_pretty(&Self::default())
                .map_err(|e| AppError::configuration(e.to_string()))?;
            std::fs::write(&config_file, contents)
                .map_err(|e| AppError::configuration(format!("{}: {}", config_file, e)))?;
        }

        let config: Self = config::Config::builder()
            .add_source(config::File::with_name(&config_file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AppError::configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string, without environment layering
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.upstream.mirrors.is_empty() {
            return Err(AppError::configuration(
                "upstream.mirrors must list at least one mirror",
            ));
        }
        if let Some(bad) = self.upstream.mirrors.iter().find(|m| !is_http_url(m)) {
            return Err(AppError::configuration(format!(
                "upstream.mirrors entry '{}' is not an http(s) URL",
                bad
            )));
        }
        if self.fetch.max_attempts_per_mirror == 0 {
            return Err(AppError::configuration(
                "fetch.max_attempts_per_mirror must be greater than zero",
            ));
        }
        if self.fetch.global_attempt_ceiling < self.fetch.max_attempts_per_mirror {
            return Err(AppError::configuration(format!(
                "fetch.global_attempt_ceiling ({}) must be at least fetch.max_attempts_per_mirror ({})",
                self.fetch.global_attempt_ceiling, self.fetch.max_attempts_per_mirror
            )));
        }
        if !self.upstream.epg_path_template.contains("{channel_id}") {
            return Err(AppError::configuration(
                "upstream.epg_path_template must contain {channel_id}",
            ));
        }
        if let Some(0) = self.refresh.workers {
            return Err(AppError::configuration("refresh.workers must be at least 1"));
        }
        Ok(())
    }
}

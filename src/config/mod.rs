//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "varco";
const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_RESOLUTION_TTL_MS: u64 = 3_000;
const DEFAULT_CONTENT_TTL_SECS: u64 = 5 * 60;
const DEFAULT_MAX_CONTENT_BYTES: u64 = 50 * 1024 * 1024;

/// Command-line arguments for the Varco binary.
#[derive(Debug, Parser)]
#[command(name = "varco", version, about = "Varco delivery router")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VARCO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listen address, e.g. `0.0.0.0:8080`.
    #[arg(long = "listen", value_name = "ADDR")]
    pub listen: Option<String>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines instead of the compact format.
    #[arg(long = "log-json", value_name = "BOOL")]
    pub log_json: Option<bool>,

    /// Override the pointer store connection string.
    #[arg(long = "pointer-store-url", value_name = "URL")]
    pub pointer_store_url: Option<String>,

    /// Override the object store bucket.
    #[arg(long = "object-store-bucket", value_name = "BUCKET")]
    pub object_store_bucket: Option<String>,

    /// Override the object store region.
    #[arg(long = "object-store-region", value_name = "REGION")]
    pub object_store_region: Option<String>,

    /// Override the object store endpoint (for S3-compatible stores).
    #[arg(long = "object-store-endpoint", value_name = "URL")]
    pub object_store_endpoint: Option<String>,

    /// Override the resolution cache TTL in milliseconds.
    #[arg(long = "cache-resolution-ttl-ms", value_name = "MS")]
    pub resolution_ttl_ms: Option<u64>,

    /// Override the content cache TTL in seconds.
    #[arg(long = "cache-content-ttl-secs", value_name = "SECS")]
    pub content_ttl_secs: Option<u64>,

    /// Override the content cache byte budget.
    #[arg(long = "cache-max-content-bytes", value_name = "BYTES")]
    pub max_content_bytes: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub pointer_store: PointerStoreSettings,
    pub object_store: ObjectStoreSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct PointerStoreSettings {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ObjectStoreSettings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub resolution_ttl: Duration,
    pub content_ttl: Duration,
    pub max_content_bytes: u64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VARCO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    pointer_store: RawPointerStoreSettings,
    object_store: RawObjectStoreSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(listen) = overrides.listen.as_ref() {
            self.server.listen = Some(listen.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.pointer_store_url.as_ref() {
            self.pointer_store.url = Some(url.clone());
        }
        if let Some(bucket) = overrides.object_store_bucket.as_ref() {
            self.object_store.bucket = Some(bucket.clone());
        }
        if let Some(region) = overrides.object_store_region.as_ref() {
            self.object_store.region = Some(region.clone());
        }
        if let Some(endpoint) = overrides.object_store_endpoint.as_ref() {
            self.object_store.endpoint = Some(endpoint.clone());
        }
        if let Some(ttl) = overrides.resolution_ttl_ms {
            self.cache.resolution_ttl_ms = Some(ttl);
        }
        if let Some(ttl) = overrides.content_ttl_secs {
            self.cache.content_ttl_secs = Some(ttl);
        }
        if let Some(budget) = overrides.max_content_bytes {
            self.cache.max_content_bytes = Some(budget);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    listen: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPointerStoreSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawObjectStoreSettings {
    bucket: Option<String>,
    region: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    resolution_ttl_ms: Option<u64>,
    content_ttl_secs: Option<u64>,
    max_content_bytes: Option<u64>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let listen = raw
            .server
            .listen
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN)
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.listen", err.to_string()))?;

        let level = match raw.logging.level.as_deref() {
            Some(value) => LevelFilter::from_str(value)
                .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let pointer_url = raw
            .pointer_store
            .url
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                LoadError::invalid("pointer_store.url", "a connection string is required")
            })?;

        let bucket = raw
            .object_store
            .bucket
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                LoadError::invalid("object_store.bucket", "a bucket name is required")
            })?;

        Ok(Self {
            server: ServerSettings { listen },
            logging: LoggingSettings { level, format },
            pointer_store: PointerStoreSettings { url: pointer_url },
            object_store: ObjectStoreSettings {
                bucket,
                region: raw.object_store.region.filter(|value| !value.is_empty()),
                endpoint: raw.object_store.endpoint.filter(|value| !value.is_empty()),
            },
            cache: CacheSettings {
                resolution_ttl: Duration::from_millis(
                    raw.cache
                        .resolution_ttl_ms
                        .unwrap_or(DEFAULT_RESOLUTION_TTL_MS),
                ),
                content_ttl: Duration::from_secs(
                    raw.cache.content_ttl_secs.unwrap_or(DEFAULT_CONTENT_TTL_SECS),
                ),
                max_content_bytes: raw
                    .cache
                    .max_content_bytes
                    .unwrap_or(DEFAULT_MAX_CONTENT_BYTES),
            },
        })
    }
}

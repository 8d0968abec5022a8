//! Configuration manager for bazaar.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Instance name.
    #[serde(default)]
    pub name: String,
    /// Domain name of current instance.
    #[serde(default)]
    pub url: String,
    /// Listening port.
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to SQLite configuration.
    #[serde(default, skip_serializing)]
    pub sqlite: Sqlite,
    /// Related to MongoDB configuration.
    #[serde(skip_serializing)]
    pub mongodb: Option<MongoDb>,
    /// Related to metrics and OTLP export.
    #[serde(default, skip_serializing)]
    pub telemetry: Telemetry,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: env!("CARGO_CRATE_NAME").to_owned(),
            url: String::default(),
            port: DEFAULT_PORT,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            sqlite: Sqlite::default(),
            mongodb: None,
            telemetry: Telemetry::default(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// SQLite configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Sqlite {
    /// Path of the database file.
    pub path: String,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl Default for Sqlite {
    fn default() -> Self {
        Self {
            path: "base.db".into(),
            pool_size: None,
        }
    }
}

/// MongoDB configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct MongoDb {
    /// Connection string.
    #[serde(default = "default_mongo_uri")]
    pub uri: String,
    /// Database holding account profiles.
    #[serde(default = "default_mongo_database")]
    pub database: String,
    /// Collection holding account profiles.
    #[serde(default = "default_mongo_collection")]
    pub collection: String,
}

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017/".into()
}

fn default_mongo_database() -> String {
    "test_db".into()
}

fn default_mongo_collection() -> String {
    "users".into()
}

/// Telemetry configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Telemetry {
    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default)]
    pub metrics: bool,
    /// gRPC endpoint of an OTLP collector.
    pub otlp_endpoint: Option<String>,
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Application version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`).
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string())
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => {
                let config: Configuration = match serde_yaml::from_reader(file)
                {
                    Ok(config) => config,
                    Err(err) => {
                        return Ok(Arc::new(self.error(err)));
                    },
                };

                Ok(Arc::new(self.finalize(config)?))
            },
            Err(err) => Ok(Arc::new(self.error(err))),
        }
    }

    /// Apply runtime values on a freshly parsed configuration.
    fn finalize(&self, mut config: Configuration) -> Result<Self, url::ParseError> {
        // set app version.
        config.version = VERSION.to_owned();
        config.path = self.path.clone();

        if !config.url.is_empty() {
            config.url = self.normalize_url(&config.url)?;
        }
        if config.name.is_empty() {
            config.name = env!("CARGO_CRATE_NAME").to_owned();
        }

        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` file not found");
        Self {
            path: self.path.clone(),
            ..Default::default()
        }
    }
}

//! Configuration for the memory herder: quota inputs loaded from TOML, plus logging setup.
//!
//! ```toml
//! [memory]
//! quota = "8GiB"       # default: memory available to the process
//! app_ratio = 0.8
//! index_ratio = 0.75
//! query_ratio = 0.75
//!
//! [logging]
//! level = "info"       # or a full `EnvFilter` directive string
//! json = false
//! ```

use herder_memory::{MemoryHerder, Quotas};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Once;

use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;

mod diagnostics;
mod validation;

pub use diagnostics::{
    ConfigDiagnostics, ConfigValidationError, ConfigWarning, ValidationDiagnostics,
};

/// A byte size which supports both raw byte counts and human-friendly suffixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bytes(u64),
            Human(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Bytes(value) => Ok(ByteSize(value)),
            Repr::Human(value) => herder_memory::parse_byte_size(&value)
                .map(ByteSize)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Process budget and the ratios that split it (`[memory]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Total memory budget for the process. Detected from the host when unset.
    #[serde(default)]
    pub quota: Option<ByteSize>,

    /// Share of `quota` available to indexing and queries combined.
    #[serde(default = "MemoryConfig::default_app_ratio")]
    pub app_ratio: f64,

    /// Share of the app quota that indexing alone may use.
    #[serde(default = "MemoryConfig::default_index_ratio")]
    pub index_ratio: f64,

    /// Share of the app quota that running queries alone may use.
    #[serde(default = "MemoryConfig::default_query_ratio")]
    pub query_ratio: f64,
}

impl MemoryConfig {
    fn default_app_ratio() -> f64 {
        0.8
    }

    fn default_index_ratio() -> f64 {
        0.75
    }

    fn default_query_ratio() -> f64 {
        0.75
    }

    /// Resolves the configured (or detected) process budget into quotas.
    pub fn quotas(&self) -> Result<Quotas, ConfigError> {
        let memory = match self.quota {
            Some(quota) => quota.0,
            None => herder_memory::detect_total_memory().ok_or(ConfigError::UnknownMemory)?,
        };
        Ok(Quotas::from_ratios(
            memory,
            self.app_ratio,
            self.index_ratio,
            self.query_ratio,
        ))
    }

    pub fn build_herder(&self) -> Result<MemoryHerder, ConfigError> {
        self.quotas().map(MemoryHerder::with_quotas)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            quota: None,
            app_ratio: Self::default_app_ratio(),
            index_ratio: Self::default_index_ratio(),
            query_ratio: Self::default_query_ratio(),
        }
    }
}

/// Logging sink configuration (`[logging]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level for all herder crates.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_owned()
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            // Anything else is treated as an `EnvFilter` directive string.
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        })
    }

    /// The effective `EnvFilter`: the configured level merged with `RUST_LOG`, if set.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        match env_directives {
            Some(env_directives) => {
                let config_directives = Self::normalize_level_directives(&self.level);
                tracing_subscriber::EnvFilter::try_new(format!(
                    "{config_directives},{env_directives}"
                ))
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

/// Top-level herder configuration loaded from TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HerderConfig {
    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ConfigValidationError>),
    #[error("memory.quota is not set and the host memory size could not be detected")]
    UnknownMemory,
}

fn join_errors(errors: &[ConfigValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl HerderConfig {
    /// Load a config from TOML text.
    ///
    /// Validation errors fail the load; unknown keys and warnings are logged.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let (config, diagnostics) = Self::load_from_str_with_diagnostics(text)?;
        if !diagnostics.is_ok() {
            return Err(ConfigError::Invalid(diagnostics.errors));
        }

        for key in &diagnostics.unknown_keys {
            tracing::warn!(target: "herder.config", key = %key, "ignoring unknown config key");
        }
        for warning in &diagnostics.warnings {
            tracing::warn!(target: "herder.config", "{warning}");
        }
        Ok(config)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::load_from_str(&read_config(path.as_ref())?)
    }

    /// Load a config from TOML text and return diagnostics instead of failing on them.
    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<HerderConfig>(text)?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        diagnostics.extend_validation(config.validate());

        Ok((config, diagnostics))
    }

    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        Self::load_from_str_with_diagnostics(&read_config(path.as_ref())?)
    }

    pub fn build_herder(&self) -> Result<MemoryHerder, ConfigError> {
        self.memory.build_herder()
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

static TRACING_INIT: Once = Once::new();

/// Installs the global `tracing` subscriber.
///
/// Safe to call multiple times; only the first call has an effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        // `cargo test` output capture only works for the stdlib's print macros, so debug builds
        // write through `TestWriter`.
        let writer = if cfg!(debug_assertions) {
            BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        };

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::debug!(
                target: "herder.config",
                "global tracing subscriber already installed"
            );
        }
    });
}

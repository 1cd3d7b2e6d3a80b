use serde::de::DeserializeOwned;
use std::fmt;

/// Combined diagnostics produced while loading and validating a herder config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDiagnostics {
    /// Keys present in the input TOML that the config schema does not know (for example
    /// `memory.app_ration`).
    pub unknown_keys: Vec<String>,
    /// Values that are accepted but probably not what the operator meant.
    pub warnings: Vec<ConfigWarning>,
    /// Values that cannot produce a working herder.
    pub errors: Vec<ConfigValidationError>,
}

impl ConfigDiagnostics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.unknown_keys.is_empty() && self.warnings.is_empty() && self.errors.is_empty()
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn extend_validation(&mut self, validation: ValidationDiagnostics) {
        self.warnings.extend(validation.warnings);
        self.errors.extend(validation.errors);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationDiagnostics {
    pub warnings: Vec<ConfigWarning>,
    pub errors: Vec<ConfigValidationError>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A share larger than its parent budget; the child ceiling can never be the binding one.
    RatioAboveOne { toml_path: String, value: f64 },
    LoggingLevelInvalid { value: String, normalized: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::RatioAboveOne { toml_path, value } => {
                write!(f, "{toml_path} = {value} is greater than 1")
            }
            ConfigWarning::LoggingLevelInvalid { value, normalized } => write!(
                f,
                "logging.level {value:?} (normalized to {normalized:?}) is not a valid filter; \
                 falling back to info"
            ),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("{toml_path} must be a finite, non-negative number (got {value})")]
    InvalidRatio { toml_path: String, value: f64 },

    #[error("memory.quota must be greater than zero")]
    ZeroQuota,
}

pub(crate) fn deserialize_toml_with_unknown_keys<T: DeserializeOwned>(
    text: &str,
) -> Result<(T, Vec<String>), toml::de::Error> {
    let mut unknown = Vec::<String>::new();
    let deserializer = toml::de::Deserializer::new(text);
    let value = serde_ignored::deserialize(deserializer, |path| {
        // `serde_ignored` renders root paths with a leading `.`.
        unknown.push(path.to_string().trim_start_matches('.').to_owned());
    })?;
    unknown.sort();
    unknown.dedup();
    Ok((value, unknown))
}

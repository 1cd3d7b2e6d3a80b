use crate::diagnostics::{ConfigValidationError, ConfigWarning, ValidationDiagnostics};
use crate::{HerderConfig, LoggingConfig};

impl HerderConfig {
    /// Validate semantic invariants for a configuration.
    ///
    /// Reports every problem found in one pass.
    #[must_use]
    pub fn validate(&self) -> ValidationDiagnostics {
        let mut out = ValidationDiagnostics::default();

        validate_memory(self, &mut out);
        validate_logging(self, &mut out);

        out
    }
}

fn validate_memory(config: &HerderConfig, out: &mut ValidationDiagnostics) {
    let memory = &config.memory;
    if matches!(memory.quota, Some(quota) if quota.0 == 0) {
        out.errors.push(ConfigValidationError::ZeroQuota);
    }

    for (toml_path, value) in [
        ("memory.app_ratio", memory.app_ratio),
        ("memory.index_ratio", memory.index_ratio),
        ("memory.query_ratio", memory.query_ratio),
    ] {
        if !value.is_finite() || value < 0.0 {
            out.errors.push(ConfigValidationError::InvalidRatio {
                toml_path: toml_path.to_owned(),
                value,
            });
        } else if value > 1.0 {
            out.warnings.push(ConfigWarning::RatioAboveOne {
                toml_path: toml_path.to_owned(),
                value,
            });
        }
    }
}

fn validate_logging(config: &HerderConfig, out: &mut ValidationDiagnostics) {
    let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
    if !config.logging.level.trim().is_empty()
        && tracing_subscriber::EnvFilter::try_new(normalized.clone()).is_err()
    {
        out.warnings.push(ConfigWarning::LoggingLevelInvalid {
            value: config.logging.level.clone(),
            normalized,
        });
    }
}

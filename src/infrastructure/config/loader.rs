use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local directory holding config and run state.
pub const CONFIG_DIR: &str = ".wavesmith";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const LOG_ROTATIONS: [&str; 3] = ["daily", "hourly", "never"];

/// A loaded configuration that cannot drive a run.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("resources.min_workers must be at least 1, got {0}")]
    InvalidMinWorkers(usize),

    #[error("resources.min_workers ({0}) exceeds max_workers ({1})")]
    InvalidWorkerBounds(usize, usize),

    #[error("resources.{name} must lie within 0..=100, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f32 },

    #[error("{resource} warning threshold ({warning}) exceeds critical ({critical})")]
    WarningAboveCritical {
        resource: &'static str,
        warning: f32,
        critical: f32,
    },

    #[error("resources.check_interval_ms must be positive")]
    ZeroCheckInterval,

    #[error("verification.timeout_secs must be positive")]
    ZeroVerificationTimeout,

    #[error("verification.output_limit must be positive")]
    ZeroOutputLimit,

    #[error("logging.level `{0}` is not one of trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("logging.format `{0}` is not one of json, pretty")]
    InvalidLogFormat(String),

    #[error("logging.rotation `{0}` is not one of daily, hourly, never")]
    InvalidRotation(String),

    #[error("generator.requests_per_second must be positive and finite, got {0}")]
    InvalidRateLimit(f64),

    #[error("generator.burst_size must be at least 1, got {0}")]
    InvalidBurstSize(u32),

    #[error("generator.initial_backoff_ms ({0}) must be below max_backoff_ms ({1})")]
    InvalidBackoff(u64, u64),
}

/// Layered figment loader for [`Config`].
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    ///
    /// Later layers win: built-in defaults, `.wavesmith/config.yaml` (written
    /// by `init`), `.wavesmith/local.yaml`, then `WAVESMITH_*` variables with
    /// `__` between nested keys.
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`], rooted at `dir`.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let base = dir.as_ref().join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.join("config.yaml")))
            .merge(Yaml::file(base.join("local.yaml")))
            .merge(Env::prefixed("WAVESMITH_").split("__"))
            .extract()
            .context("could not merge configuration layers")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Defaults overlaid with a single YAML file; no env layer.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("could not load config file {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject settings the engine cannot honor.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let bounds = &config.resources.bounds;
        if bounds.min_workers == 0 {
            return Err(ConfigError::InvalidMinWorkers(bounds.min_workers));
        }
        if bounds.min_workers > bounds.max_workers {
            return Err(ConfigError::InvalidWorkerBounds(
                bounds.min_workers,
                bounds.max_workers,
            ));
        }

        for (name, value) in [
            ("cpu_warning", bounds.cpu_warning),
            ("cpu_critical", bounds.cpu_critical),
            ("memory_warning", bounds.memory_warning),
            ("memory_critical", bounds.memory_critical),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if bounds.cpu_warning > bounds.cpu_critical {
            return Err(ConfigError::WarningAboveCritical {
                resource: "cpu",
                warning: bounds.cpu_warning,
                critical: bounds.cpu_critical,
            });
        }
        if bounds.memory_warning > bounds.memory_critical {
            return Err(ConfigError::WarningAboveCritical {
                resource: "memory",
                warning: bounds.memory_warning,
                critical: bounds.memory_critical,
            });
        }

        if config.resources.check_interval_ms == 0 {
            return Err(ConfigError::ZeroCheckInterval);
        }

        if config.verification.timeout_secs == 0 {
            return Err(ConfigError::ZeroVerificationTimeout);
        }
        if config.verification.output_limit == 0 {
            return Err(ConfigError::ZeroOutputLimit);
        }

        let logging = &config.logging;
        if !LOG_LEVELS.contains(&logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(logging.level.clone()));
        }
        if !LOG_FORMATS.contains(&logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(logging.format.clone()));
        }
        if !LOG_ROTATIONS.contains(&logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(logging.rotation.clone()));
        }

        let generator = &config.generator;
        if generator.requests_per_second <= 0.0 || !generator.requests_per_second.is_finite() {
            return Err(ConfigError::InvalidRateLimit(generator.requests_per_second));
        }
        if generator.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(generator.burst_size));
        }
        if generator.initial_backoff_ms >= generator.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                generator.initial_backoff_ms,
                generator.max_backoff_ms,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MissingOutputPolicy;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.resources.bounds.min_workers, 1);
        assert_eq!(config.resources.bounds.max_workers, 3);
        assert_eq!(config.verification.timeout_secs, 600);
        assert_eq!(config.context.results, 5);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
resources:
  min_workers: 2
  max_workers: 6
  cpu_critical: 90
scheduler:
  missing_outputs: fail_fast
verification:
  commands: [make test]
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.resources.bounds.min_workers, 2);
        assert_eq!(config.resources.bounds.max_workers, 6);
        assert!((config.resources.bounds.cpu_critical - 90.0).abs() < f32::EPSILON);
        assert!((config.resources.bounds.cpu_warning - 80.0).abs() < f32::EPSILON);
        assert_eq!(config.scheduler.missing_outputs, MissingOutputPolicy::FailFast);
        assert_eq!(config.verification.commands, vec!["make test"]);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_min_workers() {
        let mut config = Config::default();
        config.resources.bounds.min_workers = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMinWorkers(0))
        );
    }

    #[test]
    fn test_validate_inverted_worker_bounds() {
        let mut config = Config::default();
        config.resources.bounds.min_workers = 5;
        config.resources.bounds.max_workers = 2;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWorkerBounds(5, 2))
        );
    }

    #[test]
    fn test_validate_warning_above_critical() {
        let mut config = Config::default();
        config.resources.bounds.memory_warning = 95.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::WarningAboveCritical { resource: "memory", .. })
        ));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.resources.bounds.cpu_critical = 150.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ThresholdOutOfRange { name: "cpu_critical", .. })
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat("xml".into()))
        );
    }

    #[test]
    fn test_validate_zero_rate_limit() {
        let mut config = Config::default();
        config.generator.requests_per_second = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.generator.initial_backoff_ms = 30000;
        config.generator.max_backoff_ms = 10000;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30000, 10000))
        );
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.verification.timeout_secs = 0;
        assert_eq!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroVerificationTimeout)
        );

        let mut config = Config::default();
        config.resources.check_interval_ms = 0;
        assert_eq!(ConfigLoader::validate(&config), Err(ConfigError::ZeroCheckInterval));
    }

    #[test]
    fn test_load_from_dir_merges_files_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&base).unwrap();
        std::fs::write(
            base.join("config.yaml"),
            "resources:\n  max_workers: 8\nlogging:\n  level: warn\n",
        )
        .unwrap();
        std::fs::write(base.join("local.yaml"), "logging:\n  level: debug\n").unwrap();

        temp_env::with_vars(
            [
                ("WAVESMITH_RESOURCES__MIN_WORKERS", Some("2")),
                ("WAVESMITH_GENERATOR__MODEL", Some("local-model")),
            ],
            || {
                let config = ConfigLoader::load_from_dir(dir.path()).unwrap();
                assert_eq!(config.resources.bounds.max_workers, 8);
                assert_eq!(config.resources.bounds.min_workers, 2);
                assert_eq!(config.logging.level, "debug");
                assert_eq!(config.generator.model, "local-model");
            },
        );
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "resources:\n  min_workers: 0\n").unwrap();
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }
}

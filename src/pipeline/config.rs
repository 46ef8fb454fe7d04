//! Pipeline configuration.
//!
//! Replaces the module-level globals of a typical training script (bucket
//! selection, promotion threshold, retry budget) with one explicit object
//! handed to every component at construction.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::storage::{Environment, ModelSelector};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration shared by the runner, the steps and the caller boundary.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Environment selecting the storage root.
    pub environment: Environment,

    // Promotion
    /// Minimum F1 a trained model must exceed to be deployed.
    pub f1_threshold: f64,

    // Caller boundary
    /// Extra attempts for a whole invocation after a step failure.
    pub retries: u32,
    /// Wall-clock ceiling for a whole invocation.
    pub timeout: Duration,

    // Model
    /// Name used for the model artifact and its promoted versions.
    pub model_name: String,
    /// Version used by the predict step.
    pub model_selector: ModelSelector,
    /// Seed for the train/test split.
    pub random_seed: u64,
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,

    // Storage
    /// Directory holding one folder per tracked run.
    pub tracking_dir: PathBuf,
    /// Directory that local (empty prefix) keys are relative to.
    pub workdir: PathBuf,
    /// Directory where `s3://` buckets are mounted.
    pub remote_mount: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Local,
            f1_threshold: 0.8,
            retries: 1,
            timeout: Duration::from_secs(120 * 60),
            model_name: "Tree_model".to_string(),
            model_selector: ModelSelector::Latest,
            random_seed: 101,
            test_size: 0.3,
            tracking_dir: PathBuf::from("mlruns"),
            workdir: PathBuf::from("."),
            remote_mount: None,
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PIPELINE_ENVIRONMENT`: local, dev or prod (default: local)
    /// - `PIPELINE_F1_THRESHOLD`: Promotion cutoff (default: 0.8)
    /// - `PIPELINE_RETRIES`: Invocation-level retry budget (default: 1)
    /// - `PIPELINE_TIMEOUT_SECS`: Invocation timeout in seconds (default: 7200)
    /// - `PIPELINE_MODEL_NAME`: Model name (default: Tree_model)
    /// - `PIPELINE_TRACKING_DIR`: Run tracking directory (default: mlruns)
    /// - `PIPELINE_WORKDIR`: Local storage directory (default: .)
    /// - `PIPELINE_REMOTE_MOUNT`: Mount point for remote buckets (default: unset)
    /// - `PIPELINE_RANDOM_SEED`: Train/test split seed (default: 101)
    /// - `PIPELINE_TEST_SIZE`: Held-out fraction (default: 0.3)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PIPELINE_ENVIRONMENT") {
            config.environment = parse_env_value(&val, "PIPELINE_ENVIRONMENT")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_F1_THRESHOLD") {
            config.f1_threshold = parse_env_value(&val, "PIPELINE_F1_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_RETRIES") {
            config.retries = parse_env_value(&val, "PIPELINE_RETRIES")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "PIPELINE_TIMEOUT_SECS")?;
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("PIPELINE_MODEL_NAME") {
            config.model_name = val;
        }

        if let Ok(val) = std::env::var("PIPELINE_TRACKING_DIR") {
            config.tracking_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PIPELINE_WORKDIR") {
            config.workdir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("PIPELINE_REMOTE_MOUNT") {
            if !val.is_empty() {
                config.remote_mount = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("PIPELINE_RANDOM_SEED") {
            config.random_seed = parse_env_value(&val, "PIPELINE_RANDOM_SEED")?;
        }

        if let Ok(val) = std::env::var("PIPELINE_TEST_SIZE") {
            config.test_size = parse_env_value(&val, "PIPELINE_TEST_SIZE")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.f1_threshold) {
            return Err(ConfigError::ValidationFailed(
                "f1_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.test_size <= 0.0 || self.test_size >= 1.0 {
            return Err(ConfigError::ValidationFailed(
                "test_size must be strictly between 0.0 and 1.0".to_string(),
            ));
        }

        if self.timeout.as_secs() == 0 {
            return Err(ConfigError::ValidationFailed(
                "timeout must be greater than 0".to_string(),
            ));
        }

        if self.model_name.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "model_name cannot be empty".to_string(),
            ));
        }

        // The name becomes a directory under run artifacts and models/.
        if !is_valid_model_name(&self.model_name) {
            return Err(ConfigError::ValidationFailed(format!(
                "model_name '{}' may only contain letters, digits, '-' and '_'",
                self.model_name
            )));
        }

        Ok(())
    }

    /// Builder method to set the environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Builder method to set the promotion threshold.
    pub fn with_f1_threshold(mut self, threshold: f64) -> Self {
        self.f1_threshold = threshold;
        self
    }

    /// Builder method to set the retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Builder method to set the invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder method to set the model name.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    /// Builder method to set the model selector used for prediction.
    pub fn with_model_selector(mut self, selector: ModelSelector) -> Self {
        self.model_selector = selector;
        self
    }

    /// Builder method to set the split seed.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Builder method to set the held-out fraction.
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the tracking directory.
    pub fn with_tracking_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.tracking_dir = path.into();
        self
    }

    /// Builder method to set the local working directory.
    pub fn with_workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = path.into();
        self
    }

    /// Builder method to set the remote bucket mount.
    pub fn with_remote_mount(mut self, path: impl Into<PathBuf>) -> Self {
        self.remote_mount = Some(path.into());
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

fn is_valid_model_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.environment, Environment::Local);
        assert!((config.f1_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.retries, 1);
        assert_eq!(config.timeout, Duration::from_secs(7200));
        assert_eq!(config.model_name, "Tree_model");
        assert_eq!(config.model_selector, ModelSelector::Latest);
        assert_eq!(config.random_seed, 101);
        assert!(config.remote_mount.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = PipelineConfig::new()
            .with_environment(Environment::Dev)
            .with_f1_threshold(0.9)
            .with_retries(3)
            .with_timeout(Duration::from_secs(60))
            .with_model_name("Forest_model")
            .with_model_selector(ModelSelector::Version("2024-01-01_00-00-00".to_string()))
            .with_random_seed(7)
            .with_test_size(0.25)
            .with_tracking_dir("/tmp/runs")
            .with_workdir("/tmp/work")
            .with_remote_mount("/mnt/buckets");

        assert_eq!(config.environment, Environment::Dev);
        assert!((config.f1_threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.model_name, "Forest_model");
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.tracking_dir, PathBuf::from("/tmp/runs"));
        assert_eq!(config.workdir, PathBuf::from("/tmp/work"));
        assert_eq!(config.remote_mount, Some(PathBuf::from("/mnt/buckets")));
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validation_threshold_out_of_range() {
        let result = PipelineConfig::default().with_f1_threshold(1.5).validate();
        assert!(result.unwrap_err().to_string().contains("f1_threshold"));
    }

    #[test]
    fn test_validation_test_size_bounds() {
        assert!(PipelineConfig::default().with_test_size(0.0).validate().is_err());
        assert!(PipelineConfig::default().with_test_size(1.0).validate().is_err());
        assert!(PipelineConfig::default().with_test_size(0.5).validate().is_ok());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let result = PipelineConfig::default()
            .with_timeout(Duration::from_secs(0))
            .validate();
        assert!(result.unwrap_err().to_string().contains("timeout"));
    }

    #[test]
    fn test_validation_empty_model_name() {
        let result = PipelineConfig::default().with_model_name("  ").validate();
        assert!(result.unwrap_err().to_string().contains("model_name"));
    }

    #[test]
    fn test_validation_model_name_is_path_safe() {
        for name in ["../Tree_model", "a/b", "..", "a\\b", "Tree model"] {
            let result = PipelineConfig::default().with_model_name(name).validate();
            assert!(
                matches!(result, Err(ConfigError::ValidationFailed(ref msg)) if msg.contains("model_name")),
                "{} should be rejected",
                name
            );
        }
        assert!(PipelineConfig::default()
            .with_model_name("old-Tree_model2")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_parse_env_value() {
        let seed: u64 = parse_env_value("42", "PIPELINE_RANDOM_SEED").unwrap();
        assert_eq!(seed, 42);

        let env: Environment = parse_env_value("prod", "PIPELINE_ENVIRONMENT").unwrap();
        assert_eq!(env, Environment::Prod);

        let err = parse_env_value::<Environment>("staging", "PIPELINE_ENVIRONMENT").unwrap_err();
        assert!(err.to_string().contains("PIPELINE_ENVIRONMENT"));
    }
}

//! Configuration for supervisors and workflow execution
//!
//! The configuration is an explicit value threaded through constructors.
//! It can be loaded from a TOML file, overridden from `FRACTOR_*`
//! environment variables, or built in code.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for fractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Enable debug logging across components
    #[serde(default)]
    pub debug: bool,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default per-work timeout (seconds) when neither the work item nor
    /// the worker declares one
    #[serde(default = "default_worker_timeout")]
    pub default_worker_timeout: u64,

    /// Default max retry attempts for jobs without an explicit retry config
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    /// Default delay between retries (seconds)
    #[serde(default = "default_retry_delay")]
    pub default_retry_delay: u64,

    /// Enable the performance monitor
    #[serde(default)]
    pub enable_performance_monitoring: bool,

    /// Enable the error reporter
    #[serde(default = "default_true")]
    pub enable_error_reporting: bool,

    /// Worker pool size when a pool does not specify one (0 = host CPU count)
    #[serde(default)]
    pub worker_pool_size: usize,

    /// Fail workflow execution on validation errors (false demotes them to
    /// logged warnings)
    #[serde(default = "default_true")]
    pub workflow_validation_strict: bool,

    /// Guard shared structures with locks (kept for configuration
    /// compatibility; the implementation is always thread-safe)
    #[serde(default = "default_true")]
    pub thread_safe: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: default_log_level(),
            default_worker_timeout: default_worker_timeout(),
            default_max_retries: default_max_retries(),
            default_retry_delay: default_retry_delay(),
            enable_performance_monitoring: false,
            enable_error_reporting: true,
            worker_pool_size: 0,
            workflow_validation_strict: true,
            thread_safe: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, crate::Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Build configuration from the environment.
    ///
    /// Starts from `FRACTOR_CONFIG` (a TOML file path) or defaults, then
    /// applies `FRACTOR_<OPTION>` overrides.
    pub fn from_env() -> Result<Self, crate::Error> {
        let mut config = if let Ok(config_path) = std::env::var("FRACTOR_CONFIG") {
            Self::load(&config_path)?
        } else if Path::new("./config/fractor.toml").exists() {
            Self::load("./config/fractor.toml")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply `FRACTOR_<OPTION>` environment overrides.
    ///
    /// `"true"`/`"false"` coerce to bool, integer strings to integers.
    /// `FRACTOR_DEBUG` enables debug logging when set to any value.
    pub fn apply_env_overrides(&mut self) {
        if std::env::var("FRACTOR_DEBUG").is_ok() {
            self.debug = true;
        }
        if let Ok(v) = std::env::var("FRACTOR_LOG_LEVEL") {
            self.log_level = v;
        }
        env_u64("FRACTOR_DEFAULT_WORKER_TIMEOUT", &mut self.default_worker_timeout);
        env_u32("FRACTOR_DEFAULT_MAX_RETRIES", &mut self.default_max_retries);
        env_u64("FRACTOR_DEFAULT_RETRY_DELAY", &mut self.default_retry_delay);
        env_bool(
            "FRACTOR_ENABLE_PERFORMANCE_MONITORING",
            &mut self.enable_performance_monitoring,
        );
        env_bool("FRACTOR_ENABLE_ERROR_REPORTING", &mut self.enable_error_reporting);
        env_usize("FRACTOR_WORKER_POOL_SIZE", &mut self.worker_pool_size);
        env_bool(
            "FRACTOR_WORKFLOW_VALIDATION_STRICT",
            &mut self.workflow_validation_strict,
        );
        env_bool("FRACTOR_THREAD_SAFE", &mut self.thread_safe);
    }

    /// Development configuration (small pools, verbose logging)
    pub fn development() -> Self {
        Self {
            debug: true,
            log_level: "DEBUG".to_string(),
            worker_pool_size: 2,
            enable_performance_monitoring: true,
            ..Self::default()
        }
    }

    /// Production configuration (more retries, monitoring on)
    pub fn production() -> Self {
        Self {
            default_max_retries: 5,
            enable_performance_monitoring: true,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_worker_timeout == 0 {
            return Err(crate::Error::Config(
                "default_worker_timeout must be > 0".to_string(),
            ));
        }
        if self.default_max_retries == 0 {
            return Err(crate::Error::Config(
                "default_max_retries must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Default worker timeout as a Duration
    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.default_worker_timeout)
    }

    /// Default retry delay as a Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.default_retry_delay)
    }

    /// Resolved worker pool size (host CPU count when unset, 2 on failure
    /// to detect)
    pub fn resolved_pool_size(&self) -> usize {
        if self.worker_pool_size > 0 {
            self.worker_pool_size
        } else {
            host_cpu_count()
        }
    }
}

/// Host CPU count, falling back to 2 when detection fails
pub fn host_cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
}

fn env_bool(key: &str, target: &mut bool) {
    if let Ok(v) = std::env::var(key) {
        match v.as_str() {
            "true" => *target = true,
            "false" => *target = false,
            _ => {}
        }
    }
}

fn env_u64(key: &str, target: &mut u64) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.parse() {
            *target = n;
        }
    }
}

fn env_u32(key: &str, target: &mut u32) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.parse() {
            *target = n;
        }
    }
}

fn env_usize(key: &str, target: &mut usize) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.parse() {
            *target = n;
        }
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_worker_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

/// Initialize tracing from the logging configuration.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let level = if config.debug {
        "debug".to_string()
    } else {
        config.log_level.to_lowercase()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fractor={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.debug);
        assert_eq!(config.log_level, "INFO");
        assert_eq!(config.default_worker_timeout, 120);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.default_retry_delay, 1);
        assert!(!config.enable_performance_monitoring);
        assert!(config.enable_error_reporting);
        assert!(config.workflow_validation_strict);
        assert!(config.thread_safe);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolved_pool_size() {
        let mut config = Config::default();
        assert!(config.resolved_pool_size() >= 1);

        config.worker_pool_size = 7;
        assert_eq!(config.resolved_pool_size(), 7);
    }

    #[test]
    fn test_env_coercions() {
        let mut debug = false;
        std::env::set_var("FRACTOR_TEST_BOOL", "true");
        env_bool("FRACTOR_TEST_BOOL", &mut debug);
        assert!(debug);

        std::env::set_var("FRACTOR_TEST_BOOL", "false");
        env_bool("FRACTOR_TEST_BOOL", &mut debug);
        assert!(!debug);

        // Non-boolean strings leave the value untouched
        std::env::set_var("FRACTOR_TEST_BOOL", "maybe");
        env_bool("FRACTOR_TEST_BOOL", &mut debug);
        assert!(!debug);

        let mut n: u64 = 0;
        std::env::set_var("FRACTOR_TEST_INT", "42");
        env_u64("FRACTOR_TEST_INT", &mut n);
        assert_eq!(n, 42);

        std::env::remove_var("FRACTOR_TEST_BOOL");
        std::env::remove_var("FRACTOR_TEST_INT");
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            default_worker_timeout: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_presets() {
        let dev = Config::development();
        assert!(dev.debug);
        assert_eq!(dev.worker_pool_size, 2);

        let prod = Config::production();
        assert_eq!(prod.default_max_retries, 5);
        assert!(prod.enable_performance_monitoring);
    }
}

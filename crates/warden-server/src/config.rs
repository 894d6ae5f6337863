//! Configuration management for the warden decision point.
//!
//! This module provides configuration loading with multiple sources:
//! 1. Default values (hardcoded)
//! 2. Configuration file (YAML)
//! 3. Environment variables (override)
//!
//! Environment variables take precedence over config file values,
//! which take precedence over defaults.
//!
//! # Example YAML Configuration
//!
//! ```yaml
//! cache:
//!   enabled: true
//!   service:
//!     expire_seconds: 3600
//!   acl:
//!     expire_seconds: 20
//! resolver:
//!   admin_group: 1
//!   anonymous_group: 2
//! proxy:
//!   path_prefix: /ows/proxy
//! logging:
//!   level: info
//!   json: true
//! ```

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use warden_domain::{AccessCacheConfig, CacheRegionConfig, GroupId, ResolverConfig};

use crate::observability::LoggingConfig;

/// Server configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// Access cache settings
    #[serde(default)]
    pub cache: CacheSettings,

    /// Permission resolver settings
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Proxy request settings
    #[serde(default)]
    pub proxy: ProxySettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Access cache settings.
///
/// The global `enabled` flag applies to every region that does not set its
/// own. Both default to disabled.
///
/// - `WARDEN_CACHE__ENABLED=true` - Enable both regions
/// - `WARDEN_CACHE__ACL__ENABLED=false` - Keep the ACL region off regardless
/// - `WARDEN_CACHE__ACL__EXPIRE_SECONDS=20` - ACL entry lifetime
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub service: CacheRegionSettings,

    #[serde(default)]
    pub acl: CacheRegionSettings,
}

/// Settings of one cache region.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CacheRegionSettings {
    /// Overrides `cache.enabled` for this region
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Entry lifetime; absent keeps entries until evicted
    #[serde(default)]
    pub expire_seconds: Option<u64>,

    /// Maximum number of entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheRegionSettings {
    fn default() -> Self {
        Self {
            enabled: None,
            expire_seconds: None,
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_max_capacity() -> u64 {
    10_000
}

impl CacheSettings {
    fn region(&self, region: &CacheRegionSettings) -> CacheRegionConfig {
        CacheRegionConfig::default()
            .with_enabled(region.enabled.unwrap_or(self.enabled))
            .with_expire(region.expire_seconds.map(Duration::from_secs))
            .with_max_capacity(region.max_capacity)
    }

    /// Effective configuration of both regions.
    pub fn to_access_cache_config(&self) -> AccessCacheConfig {
        AccessCacheConfig {
            service: self.region(&self.service),
            acl: self.region(&self.acl),
        }
    }
}

/// Permission resolver settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ResolverSettings {
    /// Maximum resource tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Group whose members are allowed everything
    #[serde(default)]
    pub admin_group: Option<i64>,

    /// Group every principal implicitly belongs to
    #[serde(default)]
    pub anonymous_group: Option<i64>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            admin_group: None,
            anonymous_group: None,
        }
    }
}

fn default_max_depth() -> u32 {
    25
}

impl ResolverSettings {
    pub fn to_resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default().with_max_depth(self.max_depth);
        if let Some(admin) = self.admin_group {
            config = config.with_admin_group(GroupId(admin));
        }
        if let Some(anonymous) = self.anonymous_group {
            config = config.with_anonymous_group(GroupId(anonymous));
        }
        config
    }
}

/// Proxy request settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ProxySettings {
    /// Path prefix in front of `<service>/<path>`
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            path_prefix: default_path_prefix(),
        }
    }
}

fn default_path_prefix() -> String {
    "/ows/proxy".to_string()
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingSettings {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Use JSON format (true for production, false for development)
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingSettings {
    /// Logging configuration for [`init_logging`](crate::observability::init_logging).
    ///
    /// Falls back to INFO for an unparsable level; [`ServerConfig::validate`]
    /// rejects those beforehand.
    pub fn to_logging_config(&self) -> LoggingConfig {
        let level = self.level.parse().unwrap_or(tracing::Level::INFO);
        let config = if self.json {
            LoggingConfig::json()
        } else {
            LoggingConfig::text()
        };
        config.with_level(level)
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

const ENV_PREFIX: &str = "WARDEN";

fn environment() -> Environment {
    // WARDEN_CACHE__ACL__EXPIRE_SECONDS -> cache.acl.expire_seconds
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable overrides.
    ///
    /// Environment variables are prefixed with `WARDEN_` and use `__` as separator,
    /// e.g. `WARDEN_RESOLVER__MAX_DEPTH=10` overrides `resolver.max_depth`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigLoadError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;
        Ok(server_config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        let config = Config::builder()
            .add_source(Config::try_from(&ServerConfig::default())?)
            .add_source(environment())
            .build()?;

        let server_config: ServerConfig = config.try_deserialize()?;
        server_config.validate()?;
        Ok(server_config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.resolver.max_depth == 0 {
            return Err(ConfigLoadError::Invalid {
                message: "resolver.max_depth must be greater than 0".to_string(),
            });
        }

        for (name, region) in [("service", &self.cache.service), ("acl", &self.cache.acl)] {
            if region.expire_seconds == Some(0) {
                return Err(ConfigLoadError::Invalid {
                    message: format!("cache.{name}.expire_seconds must be greater than 0"),
                });
            }
            if region.max_capacity == 0 {
                return Err(ConfigLoadError::Invalid {
                    message: format!("cache.{name}.max_capacity must be greater than 0"),
                });
            }
        }

        let prefix = &self.proxy.path_prefix;
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(ConfigLoadError::Invalid {
                message: format!("proxy.path_prefix must start with '/', got: {prefix}"),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigLoadError::Invalid {
                message: format!(
                    "logging.level must be one of: {:?}, got: {}",
                    valid_levels, self.logging.level
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Test: Can load config from YAML file
    #[test]
    #[serial]
    fn test_can_load_config_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cache:
  enabled: true
  service:
    expire_seconds: 3600
  acl:
    expire_seconds: 20
    max_capacity: 500
resolver:
  max_depth: 10
  admin_group: 1
  anonymous_group: 2
proxy:
  path_prefix: /proxy
logging:
  level: debug
  json: true
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();

        assert!(config.cache.enabled);
        assert_eq!(config.cache.service.expire_seconds, Some(3600));
        assert_eq!(config.cache.acl.expire_seconds, Some(20));
        assert_eq!(config.cache.acl.max_capacity, 500);
        assert_eq!(config.resolver.max_depth, 10);
        assert_eq!(config.resolver.admin_group, Some(1));
        assert_eq!(config.resolver.anonymous_group, Some(2));
        assert_eq!(config.proxy.path_prefix, "/proxy");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    /// Test: Can override config with env vars
    #[test]
    #[serial]
    fn test_can_override_config_with_env_vars() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cache:
  enabled: true
resolver:
  max_depth: 10
"#
        )
        .unwrap();

        std::env::set_var("WARDEN_CACHE__ACL__ENABLED", "false");
        std::env::set_var("WARDEN_RESOLVER__MAX_DEPTH", "7");

        let config = ServerConfig::load(file.path());

        std::env::remove_var("WARDEN_CACHE__ACL__ENABLED");
        std::env::remove_var("WARDEN_RESOLVER__MAX_DEPTH");

        let config = config.unwrap();
        assert_eq!(config.resolver.max_depth, 7);
        assert_eq!(config.cache.acl.enabled, Some(false));

        let cache = config.cache.to_access_cache_config();
        assert!(cache.service.enabled);
        assert!(!cache.acl.enabled);
    }

    /// Test: from_env loads defaults with env overrides
    #[test]
    #[serial]
    fn test_from_env_loads_defaults_with_env_overrides() {
        std::env::set_var("WARDEN_LOGGING__LEVEL", "warn");

        let config = ServerConfig::from_env();

        std::env::remove_var("WARDEN_LOGGING__LEVEL");

        let config = config.unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.resolver.max_depth, 25);
        assert_eq!(config.proxy.path_prefix, "/ows/proxy");
    }

    /// Test: Default config is valid and caches nothing
    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        let cache = config.cache.to_access_cache_config();
        assert!(!cache.service.enabled);
        assert!(!cache.acl.enabled);
        assert_eq!(cache.acl.expire, None);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_region_setting_overrides_global_switch() {
        let settings = CacheSettings {
            enabled: false,
            service: CacheRegionSettings {
                enabled: Some(true),
                expire_seconds: Some(60),
                max_capacity: 10,
            },
            acl: CacheRegionSettings::default(),
        };

        let cache = settings.to_access_cache_config();

        assert!(cache.service.enabled);
        assert_eq!(cache.service.expire, Some(Duration::from_secs(60)));
        assert_eq!(cache.service.max_capacity, 10);
        assert!(!cache.acl.enabled);
    }

    #[test]
    fn test_resolver_settings_map_to_resolver_config() {
        let settings = ResolverSettings {
            max_depth: 5,
            admin_group: Some(1),
            anonymous_group: None,
        };

        let config = settings.to_resolver_config();

        assert_eq!(config.max_depth, 5);
        assert_eq!(config.admin_group, Some(GroupId(1)));
        assert_eq!(config.anonymous_group, None);
    }

    /// Test: Config validation catches errors
    #[test]
    fn test_config_validation_catches_errors() {
        let mut config = ServerConfig::default();
        config.resolver.max_depth = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_depth"));

        let mut config = ServerConfig::default();
        config.cache.acl.expire_seconds = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.acl.expire_seconds"));

        let mut config = ServerConfig::default();
        config.cache.service.max_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.service.max_capacity"));

        let mut config = ServerConfig::default();
        config.proxy.path_prefix = "ows".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("path_prefix"));

        let mut config = ServerConfig::default();
        config.logging.level = "invalid".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    /// Test: Invalid config returns clear error
    #[test]
    fn test_invalid_config_returns_clear_error() {
        let result = ServerConfig::load("/nonexistent/path/config.yaml");
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigLoadError::FileNotFound { .. }));
        assert!(err.to_string().contains("not found"));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid: yaml: syntax: [").unwrap();
        let err = ServerConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigLoadError::Load(_)));
    }

    #[test]
    fn test_logging_settings_map_to_logging_config() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json: true,
        };

        let config = settings.to_logging_config();

        assert!(config.json_format);
        assert_eq!(config.default_level, tracing::Level::DEBUG);
    }
}

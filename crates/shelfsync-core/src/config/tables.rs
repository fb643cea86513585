use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

/// On-disk layout of `conf/config.toml`.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    policy: PolicyConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    remote: RemoteConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            tie_break_threshold: tables.policy.tie_break_threshold,
            recent_limit: tables.policy.recent_limit,
            log_level: tables.logging.log_level,
            base_url: tables.remote.base_url,
            timeout_secs: tables.remote.timeout_secs,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            policy: PolicyConfig {
                tie_break_threshold: config.tie_break_threshold,
                recent_limit: config.recent_limit,
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            remote: RemoteConfig {
                base_url: config.base_url.clone(),
                timeout_secs: config.timeout_secs,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PolicyConfig {
    #[serde(default = "defaults::default_tie_break_threshold")]
    tie_break_threshold: f64,
    #[serde(default = "defaults::default_recent_limit")]
    recent_limit: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            tie_break_threshold: defaults::default_tie_break_threshold(),
            recent_limit: defaults::default_recent_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct RemoteConfig {
    #[serde(default = "defaults::default_base_url")]
    base_url: String,
    #[serde(default = "defaults::default_timeout_secs")]
    timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: defaults::default_base_url(),
            timeout_secs: defaults::default_timeout_secs(),
        }
    }
}

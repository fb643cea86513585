use crate::sync::SyncPolicy;
use serde::Deserialize;

pub const MAX_RECENT_LIMIT: usize = 512;

/// Flattened application configuration.
///
/// Decoded through the table layout in `tables.rs`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub tie_break_threshold: f64,
    pub recent_limit: usize,
    pub log_level: LogLevel,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tie_break_threshold: crate::config::defaults::default_tie_break_threshold(),
            recent_limit: crate::config::defaults::default_recent_limit(),
            log_level: crate::config::defaults::default_log_level(),
            base_url: crate::config::defaults::default_base_url(),
            timeout_secs: crate::config::defaults::default_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Pull every value back into its supported range.
    pub fn clamped(mut self) -> Self {
        self.tie_break_threshold = if self.tie_break_threshold.is_nan() {
            crate::config::defaults::default_tie_break_threshold()
        } else {
            self.tie_break_threshold.clamp(0.0, 1.0)
        };
        self.recent_limit = self.recent_limit.clamp(1, MAX_RECENT_LIMIT);
        self.timeout_secs = self.timeout_secs.max(1);
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        self
    }

    pub fn sync_policy(&self) -> SyncPolicy {
        SyncPolicy {
            tie_break_threshold: self.tie_break_threshold,
        }
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

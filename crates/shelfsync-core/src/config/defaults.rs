pub(crate) fn default_tie_break_threshold() -> f64 {
    crate::sync::DEFAULT_TIE_BREAK_THRESHOLD
}

pub(crate) fn default_recent_limit() -> usize {
    12
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Info
}

pub(crate) fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

pub(crate) fn default_timeout_secs() -> u64 {
    15
}

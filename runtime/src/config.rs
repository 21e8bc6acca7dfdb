//! Environment-driven configuration for a SILTA server
//!
//! Every knob has a `SILTA_*` environment variable and a sensible
//! default; loading never fails and never panics — an unparseable value
//! falls back to its default with a warning.

use tracing::warn;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable console output
    Pretty,
    /// One JSON object per line
    Json,
}

/// Configuration for one governance server process
#[derive(Debug, Clone)]
pub struct Config {
    /// Server (tenant) name — `SILTA_SERVER_NAME`
    pub server_name: String,
    /// Service name — `SILTA_SERVICE_NAME`
    pub service_name: String,
    /// Inbound change-notification topic — `SILTA_INBOUND_TOPIC`
    pub inbound_topic: String,
    /// Outbound correlated-event topic — `SILTA_OUTBOUND_TOPIC`
    pub outbound_topic: String,
    /// Log format, `pretty` or `json` — `SILTA_LOG_FORMAT`
    pub log_format: LogFormat,
    /// Bound on concurrent derivation tasks — `SILTA_DERIVE_WORKERS`
    pub derive_workers: usize,
    /// Comma-separated zone tags — `SILTA_SUPPORTED_ZONES`
    pub supported_zones: Vec<String>,
    /// Default annotation page size — `SILTA_PAGE_SIZE`
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: "silta".to_string(),
            service_name: "governance".to_string(),
            inbound_topic: "silta.changes.inbound".to_string(),
            outbound_topic: "silta.changes.outbound".to_string(),
            log_format: LogFormat::Pretty,
            derive_workers: 8,
            supported_zones: Vec::new(),
            page_size: 50,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    ///
    /// `from_env` in disguise; lets tests supply variables without
    /// touching the process environment.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| var(key).unwrap_or(default);
        let number = |key: &str, default: usize| match var(key) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(key, value = %raw, "unparseable numeric setting; using default");
                default
            }),
            None => default,
        };

        let log_format = match var("SILTA_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("pretty") | None => LogFormat::Pretty,
            Some(other) => {
                warn!(value = other, "unknown SILTA_LOG_FORMAT; using pretty");
                LogFormat::Pretty
            }
        };
        let supported_zones = var("SILTA_SUPPORTED_ZONES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|z| !z.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            server_name: string("SILTA_SERVER_NAME", defaults.server_name),
            service_name: string("SILTA_SERVICE_NAME", defaults.service_name),
            inbound_topic: string("SILTA_INBOUND_TOPIC", defaults.inbound_topic),
            outbound_topic: string("SILTA_OUTBOUND_TOPIC", defaults.outbound_topic),
            log_format,
            derive_workers: number("SILTA_DERIVE_WORKERS", defaults.derive_workers).max(1),
            supported_zones,
            page_size: number("SILTA_PAGE_SIZE", defaults.page_size).max(1),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let config = Config::from_vars(|_| None);
        assert_eq!(config.server_name, "silta");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.derive_workers, 8);
        assert!(config.supported_zones.is_empty());
    }

    #[test]
    fn test_overrides_are_read() {
        let config = Config::from_vars(vars(&[
            ("SILTA_SERVER_NAME", "cocoMDS1"),
            ("SILTA_LOG_FORMAT", "json"),
            ("SILTA_DERIVE_WORKERS", "3"),
            ("SILTA_SUPPORTED_ZONES", "quarantine, trash-can"),
        ]));
        assert_eq!(config.server_name, "cocoMDS1");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.derive_workers, 3);
        assert_eq!(config.supported_zones, vec!["quarantine", "trash-can"]);
    }

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let config = Config::from_vars(vars(&[
            ("SILTA_DERIVE_WORKERS", "many"),
            ("SILTA_LOG_FORMAT", "yaml"),
        ]));
        assert_eq!(config.derive_workers, 8);
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_zero_workers_clamps_to_one() {
        let config = Config::from_vars(vars(&[("SILTA_DERIVE_WORKERS", "0")]));
        assert_eq!(config.derive_workers, 1);
    }
}

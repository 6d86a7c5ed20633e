//! Demo configuration.

use std::env;
use std::str::FromStr;

use graft_sync::TickConfig;

/// Overrides the tick rate.
pub const TICK_RATE_ENV: &str = "GRAFT_TICK_RATE";
/// Overrides the number of ticks the client loop runs.
pub const MAX_TICKS_ENV: &str = "GRAFT_MAX_TICKS";
/// When set, payloads go through NATS instead of the in-process transport.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Errors reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be positive, got {value}")]
    NotPositive { var: &'static str, value: f64 },
}

/// Configuration for a demo run.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Main loop pacing for the client side.
    pub tick: TickConfig,
    /// Optional NATS URL; `None` keeps everything in-process.
    pub nats_url: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig {
                tick_rate: 60.0,
                max_ticks: 30,
            },
            nats_url: None,
        }
    }
}

impl DemoConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick.tick_rate = tick_rate;
        self
    }

    /// Limit the client loop to `max_ticks` ticks (0 = unlimited).
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.tick.max_ticks = max_ticks;
        self
    }

    /// Route sync payloads through the NATS server at `url`.
    #[must_use]
    pub fn with_nats_url(mut self, url: impl Into<String>) -> Self {
        self.nats_url = Some(url.into());
        self
    }

    /// Defaults overridden by [`TICK_RATE_ENV`], [`MAX_TICKS_ENV`] and
    /// [`NATS_URL_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable does not parse or the
    /// tick rate is not positive.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        if let Some(rate) = parse_var::<f64>(&lookup, TICK_RATE_ENV)? {
            if rate <= 0.0 || !rate.is_finite() {
                return Err(ConfigError::NotPositive {
                    var: TICK_RATE_ENV,
                    value: rate,
                });
            }
            config = config.with_tick_rate(rate);
        }
        if let Some(max_ticks) = parse_var::<u64>(&lookup, MAX_TICKS_ENV)? {
            config = config.with_max_ticks(max_ticks);
        }
        if let Some(url) = lookup(NATS_URL_ENV).filter(|url| !url.is_empty()) {
            config = config.with_nats_url(url);
        }
        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<DemoConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DemoConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_without_env() {
        let config = from(&[]).unwrap();
        assert_eq!(config.tick.max_ticks, 30);
        assert!(config.nats_url.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = from(&[
            (TICK_RATE_ENV, "120"),
            (MAX_TICKS_ENV, "5"),
            (NATS_URL_ENV, "nats://example:4222"),
        ])
        .unwrap();
        assert!((config.tick.tick_rate - 120.0).abs() < f64::EPSILON);
        assert_eq!(config.tick.max_ticks, 5);
        assert_eq!(config.nats_url.as_deref(), Some("nats://example:4222"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(matches!(
            from(&[(MAX_TICKS_ENV, "lots")]),
            Err(ConfigError::InvalidNumber { var: MAX_TICKS_ENV, .. })
        ));
        assert!(matches!(
            from(&[(TICK_RATE_ENV, "0")]),
            Err(ConfigError::NotPositive { .. })
        ));
    }

    #[test]
    fn test_builder() {
        let config = DemoConfig::new().with_max_ticks(0).with_nats_url("nats://x");
        assert_eq!(config.tick.max_ticks, 0);
        assert_eq!(config.nats_url.as_deref(), Some("nats://x"));
    }
}

//! Progress telemetry configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// Progress telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Minimum spacing between two throttled progress events
    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    /// Span of the moving average used for rows/second and ETA
    #[serde(default = "default_throughput_window_ms")]
    pub throughput_window_ms: u64,

    /// Per-run event buffer; lagging subscribers drop the oldest events
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl TelemetryConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn throughput_window(&self) -> Duration {
        Duration::from_millis(self.throughput_window_ms)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            publish_interval_ms: default_publish_interval_ms(),
            throughput_window_ms: default_throughput_window_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Validatable for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.publish_interval_ms, "publish_interval_ms", self.domain_name())?;
        validate_positive(self.throughput_window_ms, "throughput_window_ms", self.domain_name())?;
        validate_positive(self.channel_capacity, "channel_capacity", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "telemetry"
    }
}

fn default_publish_interval_ms() -> u64 {
    250
}

fn default_throughput_window_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    256
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.publish_interval(), Duration::from_millis(250));
        assert_eq!(config.throughput_window(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = TelemetryConfig {
            publish_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

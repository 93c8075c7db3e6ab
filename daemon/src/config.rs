//! Daemon configuration.

use std::time::Duration;

use driftfx_common::constants::DEFAULT_TICK_HOUR;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Hour of day (UTC) at which the daily tick fires.
    pub tick_hour: u32,
    /// Legacy policy: skip the tick entirely when no digest channel is
    /// configured. Off by default; rates advance whether or not anyone
    /// is listening.
    pub tick_requires_channel: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_hour: DEFAULT_TICK_HOUR,
            tick_requires_channel: false,
        }
    }
}

/// Main daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Node ID (generated when absent).
    pub node_id: Option<String>,
    /// Deadline for a single persistence call.
    pub persist_timeout: Duration,
    /// Seed the default market when the backing store is empty.
    pub seed_default_market: bool,
    /// Scheduler configuration.
    pub scheduler: SchedulerConfig,
    /// Digest channel preconfigured at startup.
    pub channel_id: Option<String>,
    /// Manager role preconfigured at startup.
    pub manager_role_id: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            persist_timeout: Duration::from_secs(5),
            seed_default_market: true,
            scheduler: SchedulerConfig::default(),
            channel_id: None,
            manager_role_id: None,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(node_id) = std::env::var("MARKET_NODE_ID") {
            config.node_id = Some(node_id);
        }

        if let Ok(hour) = std::env::var("MARKET_TICK_HOUR") {
            if let Ok(hour) = hour.parse() {
                config.scheduler.tick_hour = hour;
            }
        }

        if let Ok(flag) = std::env::var("MARKET_TICK_REQUIRES_CHANNEL") {
            config.scheduler.tick_requires_channel = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        if let Ok(ms) = std::env::var("MARKET_PERSIST_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                config.persist_timeout = Duration::from_millis(ms);
            }
        }

        if let Ok(channel) = std::env::var("MARKET_CHANNEL_ID") {
            config.channel_id = Some(channel);
        }

        if let Ok(role) = std::env::var("MARKET_MANAGER_ROLE_ID") {
            config.manager_role_id = Some(role);
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.scheduler.tick_hour >= 24 {
            return Err(format!(
                "Tick hour must be below 24, got {}",
                self.scheduler.tick_hour
            ));
        }

        if self.persist_timeout.is_zero() {
            return Err("Persist timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.tick_hour, 12);
        assert!(!config.scheduler.tick_requires_channel);
    }

    #[test]
    fn test_invalid_tick_hour() {
        let mut config = DaemonConfig::default();
        config.scheduler.tick_hour = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_persist_timeout() {
        let mut config = DaemonConfig::default();
        config.persist_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}

//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for the engine and its coordinator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum failed push attempts before an outbox entry is dropped.
    pub max_retries: u32,
    /// Interval between periodic full sync cycles.
    pub sync_interval: Duration,
    /// Delay before the first automatic sync after startup.
    pub initial_kick: Duration,
    /// How long the success status is displayed before decaying to idle.
    pub success_decay: Duration,
    /// Delay between attempts to open a locked store.
    pub open_retry_delay: Duration,
}

impl EngineConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            sync_interval: Duration::from_secs(600),
            initial_kick: Duration::from_secs(5),
            success_decay: Duration::from_secs(3),
            open_retry_delay: Duration::from_secs(3),
        }
    }

    /// Sets the outbox retry cap.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the startup kick delay.
    pub fn with_initial_kick(mut self, delay: Duration) -> Self {
        self.initial_kick = delay;
        self
    }

    /// Sets the success display decay.
    pub fn with_success_decay(mut self, decay: Duration) -> Self {
        self.success_decay = decay;
        self
    }

    /// Sets the store open retry delay.
    pub fn with_open_retry_delay(mut self, delay: Duration) -> Self {
        self.open_retry_delay = delay;
        self
    }

    /// A configuration with all timers collapsed, for tests.
    pub fn immediate() -> Self {
        Self {
            max_retries: 3,
            sync_interval: Duration::from_millis(50),
            initial_kick: Duration::ZERO,
            success_decay: Duration::ZERO,
            open_retry_delay: Duration::ZERO,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_max_retries(5)
            .with_sync_interval(Duration::from_secs(60))
            .with_initial_kick(Duration::from_secs(1))
            .with_success_decay(Duration::from_millis(500));

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.initial_kick, Duration::from_secs(1));
        assert_eq!(config.success_decay, Duration::from_millis(500));
    }

    #[test]
    fn default_matches_documented_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sync_interval, Duration::from_secs(600));
        assert_eq!(config.initial_kick, Duration::from_secs(5));
        assert_eq!(config.success_decay, Duration::from_secs(3));
        assert_eq!(config.open_retry_delay, Duration::from_secs(3));
    }
}

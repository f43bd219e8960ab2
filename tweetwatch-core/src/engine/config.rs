//! Engine runtime settings

use crate::config::MonitorConfig;
use crate::rate_limit::Tier;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime knobs of the protocol engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on a caller's wait for an adapter or reply policy
    pub adapter_timeout: Duration,
    /// Reject requests for conversations that were never opened
    pub strict: bool,
    /// Idle time after which conversations are evicted
    pub retention: Duration,
    pub eviction_interval: Duration,
    pub persistence_path: Option<PathBuf>,
    pub flush_on_shutdown: bool,
    /// Initial rate-limit tier
    pub tier: Tier,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            adapter_timeout: Duration::from_secs(30),
            strict: false,
            retention: Duration::from_secs(86_400),
            eviction_interval: Duration::from_secs(300),
            persistence_path: None,
            flush_on_shutdown: true,
            tier: Tier::Free,
        }
    }
}

impl From<&MonitorConfig> for EngineConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            adapter_timeout: Duration::from_millis(config.engine.adapter_timeout_ms),
            strict: config.conversations.strict,
            retention: config.retention(),
            eviction_interval: Duration::from_secs(config.engine.eviction_interval_secs),
            persistence_path: config.conversations.persistence_path.clone(),
            flush_on_shutdown: config.conversations.flush_on_shutdown,
            tier: config.api.tier,
        }
    }
}

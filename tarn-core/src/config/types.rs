//! Typed configuration for the trader.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::execution::ExecutionConfig;

/// How the strategy thread waits for price updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollingMode {
    /// Condition variable with a short timeout. Lowest CPU.
    Blocking,
    /// Permanent spin. Lowest latency, burns a core.
    BusyPoll,
    /// Spin a bounded number of iterations, then block.
    #[default]
    Hybrid,
}

impl PollingMode {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "blocking" => Some(PollingMode::Blocking),
            "busy_poll" => Some(PollingMode::BusyPoll),
            "hybrid" => Some(PollingMode::Hybrid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StrategySettings {
    pub starting_asset: String,
    /// Fee in percent applied when no per-symbol override exists.
    pub default_fee: f64,
    /// Fraction of the starting-asset balance staked per cycle.
    pub risk: f64,
    pub min_profit_ratio: f64,
    pub live_mode: bool,
    /// Per-symbol fee overrides in percent, keyed by display name.
    pub symbol_fees: HashMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub md_endpoint: String,
    pub md_port: u16,
    pub oe_endpoint: String,
    pub oe_port: u16,
    pub rest_endpoint: String,
    pub api_key: String,
    pub ed25519_key_path: String,
}

#[derive(Debug, Clone)]
pub struct PerformanceSettings {
    pub polling_mode: PollingMode,
    pub busy_poll_spin_count: u32,
}

#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    pub trade_log_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ExecutionSettings {
    pub leg_timeout_ms: u64,
    pub rollback_timeout_ms: u64,
    pub fill_tolerance: f64,
    pub rollback_retries: u32,
}

impl ExecutionSettings {
    pub fn to_execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            leg_timeout: Duration::from_millis(self.leg_timeout_ms),
            rollback_timeout: Duration::from_millis(self.rollback_timeout_ms),
            fill_tolerance: self.fill_tolerance,
            rollback_retries: self.rollback_retries,
        }
    }
}

/// Paper-trading harness knobs; ignored in live mode.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub exchange_info_path: PathBuf,
    pub initial_balance: f64,
    /// Number of synthetic feed ticks before the session winds down.
    pub feed_ticks: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub strategy: StrategySettings,
    pub connection: ConnectionSettings,
    pub performance: PerformanceSettings,
    pub persistence: PersistenceSettings,
    pub execution: ExecutionSettings,
    pub simulation: SimulationSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_mode_parses_known_values() {
        assert_eq!(PollingMode::parse("blocking"), Some(PollingMode::Blocking));
        assert_eq!(PollingMode::parse("BUSY_POLL"), Some(PollingMode::BusyPoll));
        assert_eq!(PollingMode::parse("Hybrid"), Some(PollingMode::Hybrid));
        assert_eq!(PollingMode::parse("adaptive"), None);
    }

    #[test]
    fn execution_settings_convert_to_durations() {
        let settings = ExecutionSettings {
            leg_timeout_ms: 5_000,
            rollback_timeout_ms: 10_000,
            fill_tolerance: 0.99,
            rollback_retries: 1,
        };
        let config = settings.to_execution_config();
        assert_eq!(config.leg_timeout, Duration::from_secs(5));
        assert_eq!(config.rollback_timeout, Duration::from_secs(10));
    }
}

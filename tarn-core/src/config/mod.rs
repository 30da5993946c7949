//! INI configuration loading and validation.
//!
//! Sections mirror the deployment surface: `[TRIANGULAR_ARB_STRATEGY]`,
//! `[FIX_CONNECTION]`, `[PERFORMANCE]`, `[PERSISTENCE]`, `[EXECUTION]`,
//! `[SYMBOL_FEES]`, and `[SIMULATION]` for the paper harness. Environment
//! variables with a `TARN_` prefix override file values
//! (`TARN_TRIANGULAR_ARB_STRATEGY__liveMode=true`).

pub mod types;

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use config::{Config as Loader, Environment, File, FileFormat};
use tracing::warn;

pub use types::{
    Config, ConnectionSettings, ExecutionSettings, PerformanceSettings, PersistenceSettings,
    PollingMode, SimulationSettings, StrategySettings,
};

/// One parsed INI section. Section and key lookups are case-insensitive so
/// the loader is indifferent to how the backend normalizes key case; all
/// sources matching a section name are merged.
struct Section<'a> {
    name: &'a str,
    entries: HashMap<&'a str, &'a str>,
}

impl<'a> Section<'a> {
    fn find(raw: &'a HashMap<String, HashMap<String, String>>, name: &'a str) -> Self {
        let mut entries = HashMap::new();
        for (section, values) in raw {
            if section.eq_ignore_ascii_case(name) {
                for (key, value) in values {
                    entries.insert(key.as_str(), value.as_str());
                }
            }
        }
        Self { name, entries }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| *v)
    }

    fn required(&self, key: &str) -> Result<String> {
        match self.get(key) {
            Some(value) => Ok(value.to_owned()),
            None => bail!("missing required config key {}.{}", self.name, key),
        }
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_owned()
    }

    fn f64(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .with_context(|| format!("config key {}.{} is not a number: {value:?}", self.name, key)),
            None => Ok(default),
        }
    }

    fn u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            Some(value) => value
                .parse()
                .with_context(|| format!("config key {}.{} is not an integer: {value:?}", self.name, key)),
            None => Ok(default),
        }
    }

    fn u32(&self, key: &str, default: u32) -> Result<u32> {
        Ok(self.u64(key, default as u64)? as u32)
    }

    fn u16(&self, key: &str, default: u16) -> Result<u16> {
        Ok(self.u64(key, default as u64)? as u16)
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => bail!("config key {}.{} is not a bool: {other:?}", self.name, key),
            },
            None => Ok(default),
        }
    }

    fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

impl Config {
    /// Load and validate the INI file at `path`, applying `TARN_`
    /// environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw: HashMap<String, HashMap<String, String>> = Loader::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .add_source(Environment::with_prefix("TARN").separator("__"))
            .build()
            .with_context(|| format!("reading config file {}", path.display()))?
            .try_deserialize()
            .context("config file must contain only sectioned key=value pairs")?;

        let config = Self::from_sections(&raw)?;
        config.validate()?;
        Ok(config)
    }

    fn from_sections(raw: &HashMap<String, HashMap<String, String>>) -> Result<Self> {
        let strategy = Section::find(raw, "TRIANGULAR_ARB_STRATEGY");
        let connection = Section::find(raw, "FIX_CONNECTION");
        let performance = Section::find(raw, "PERFORMANCE");
        let persistence = Section::find(raw, "PERSISTENCE");
        let execution = Section::find(raw, "EXECUTION");
        let fees = Section::find(raw, "SYMBOL_FEES");
        let simulation = Section::find(raw, "SIMULATION");

        let mut symbol_fees = HashMap::new();
        for (symbol, fee) in fees.entries() {
            let fee: f64 = fee
                .parse()
                .with_context(|| format!("SYMBOL_FEES.{symbol} is not a number: {fee:?}"))?;
            // Symbol names are upper-case on the wire; normalize in case the
            // backend case-folded the keys.
            symbol_fees.insert(symbol.to_ascii_uppercase(), fee);
        }

        let polling_mode_text = performance.string("pollingMode", "hybrid");
        let Some(polling_mode) = PollingMode::parse(&polling_mode_text) else {
            bail!(
                "PERFORMANCE.pollingMode must be one of blocking, busy_poll, hybrid (got {polling_mode_text:?})"
            );
        };

        Ok(Config {
            strategy: StrategySettings {
                starting_asset: strategy.required("startingAsset")?,
                default_fee: strategy.f64("defaultFee", 0.1)?,
                risk: strategy.f64("risk", 1.0)?,
                min_profit_ratio: strategy.f64("minProfitRatio", 1.0001)?,
                live_mode: strategy.bool("liveMode", false)?,
                symbol_fees,
            },
            connection: ConnectionSettings {
                md_endpoint: connection.string("mdEndpoint", "fix-md.testnet.binance.vision"),
                md_port: connection.u16("mdPort", 9000)?,
                oe_endpoint: connection.string("oeEndpoint", "fix-oe.testnet.binance.vision"),
                oe_port: connection.u16("oePort", 9000)?,
                rest_endpoint: connection.string("restEndpoint", "testnet.binance.vision"),
                api_key: connection.string("apiKey", ""),
                ed25519_key_path: connection.string("ed25519KeyPath", ""),
            },
            performance: PerformanceSettings {
                polling_mode,
                busy_poll_spin_count: performance.u32("busyPollSpinCount", 10_000)?,
            },
            persistence: PersistenceSettings {
                trade_log_dir: persistence.string("tradeLogDir", "./trades").into(),
            },
            execution: ExecutionSettings {
                leg_timeout_ms: execution.u64("legTimeoutMs", 5_000)?,
                rollback_timeout_ms: execution.u64("rollbackTimeoutMs", 10_000)?,
                fill_tolerance: execution.f64("fillTolerance", 0.99)?,
                rollback_retries: execution.u32("rollbackRetries", 1)?,
            },
            simulation: SimulationSettings {
                exchange_info_path: simulation
                    .string("exchangeInfoPath", "./fixtures/exchange_info.json")
                    .into(),
                initial_balance: simulation.f64("initialBalance", 10_000.0)?,
                feed_ticks: simulation.u64("feedTicks", 10_000)?,
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategy.starting_asset.trim().is_empty() {
            bail!("TRIANGULAR_ARB_STRATEGY.startingAsset must not be empty");
        }
        if !(0.0..100.0).contains(&self.strategy.default_fee) {
            bail!("TRIANGULAR_ARB_STRATEGY.defaultFee must be a percentage in [0, 100)");
        }
        if self.strategy.risk <= 0.0 || self.strategy.risk > 1.0 {
            bail!("TRIANGULAR_ARB_STRATEGY.risk must be in (0, 1]");
        }
        if self.strategy.min_profit_ratio <= 0.0 {
            bail!("TRIANGULAR_ARB_STRATEGY.minProfitRatio must be positive");
        }
        if self.strategy.live_mode && self.connection.api_key.is_empty() {
            bail!("FIX_CONNECTION.apiKey is required in live mode");
        }
        if self.strategy.live_mode && self.connection.ed25519_key_path.is_empty() {
            bail!("FIX_CONNECTION.ed25519KeyPath is required in live mode");
        }
        if self.execution.fill_tolerance <= 0.0 || self.execution.fill_tolerance > 1.0 {
            bail!("EXECUTION.fillTolerance must be in (0, 1]");
        }
        if self.execution.leg_timeout_ms == 0 || self.execution.rollback_timeout_ms == 0 {
            bail!("EXECUTION timeouts must be positive");
        }
        if self.strategy.min_profit_ratio < 1.0 {
            warn!(
                "[Config] minProfitRatio {} is below 1.0; the screen will pass losing paths",
                self.strategy.min_profit_ratio
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = "[TRIANGULAR_ARB_STRATEGY]\nstartingAsset = USDT\n";

    #[test]
    fn minimal_config_gets_defaults() {
        let file = write_config(MINIMAL);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.strategy.starting_asset, "USDT");
        assert_eq!(config.strategy.default_fee, 0.1);
        assert_eq!(config.strategy.risk, 1.0);
        assert_eq!(config.strategy.min_profit_ratio, 1.0001);
        assert!(!config.strategy.live_mode);
        assert_eq!(config.performance.polling_mode, PollingMode::Hybrid);
        assert_eq!(config.performance.busy_poll_spin_count, 10_000);
        assert_eq!(config.persistence.trade_log_dir.to_str().unwrap(), "./trades");
        assert_eq!(config.execution.leg_timeout_ms, 5_000);
    }

    #[test]
    fn full_config_parses() {
        let file = write_config(
            "[TRIANGULAR_ARB_STRATEGY]\n\
             startingAsset = USDT\n\
             defaultFee = 0.075\n\
             risk = 0.5\n\
             minProfitRatio = 1.001\n\
             liveMode = false\n\
             [FIX_CONNECTION]\n\
             mdEndpoint = fix-md.example.com\n\
             mdPort = 9100\n\
             apiKey = key123\n\
             [PERFORMANCE]\n\
             pollingMode = busy_poll\n\
             busyPollSpinCount = 500\n\
             [PERSISTENCE]\n\
             tradeLogDir = /tmp/tarn-trades\n\
             [EXECUTION]\n\
             legTimeoutMs = 2000\n\
             fillTolerance = 0.95\n\
             [SYMBOL_FEES]\n\
             BTCUSDT = 0.05\n\
             ETHUSDT = 0.075\n",
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.strategy.default_fee, 0.075);
        assert_eq!(config.strategy.risk, 0.5);
        assert_eq!(config.connection.md_endpoint, "fix-md.example.com");
        assert_eq!(config.connection.md_port, 9100);
        assert_eq!(config.performance.polling_mode, PollingMode::BusyPoll);
        assert_eq!(config.performance.busy_poll_spin_count, 500);
        assert_eq!(config.execution.leg_timeout_ms, 2_000);
        assert_eq!(config.execution.fill_tolerance, 0.95);
        assert_eq!(config.strategy.symbol_fees.get("BTCUSDT"), Some(&0.05));
        assert_eq!(config.strategy.symbol_fees.get("ETHUSDT"), Some(&0.075));
    }

    #[test]
    fn missing_starting_asset_fails() {
        let file = write_config("[TRIANGULAR_ARB_STRATEGY]\ndefaultFee = 0.1\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("startingAsset"));
    }

    #[test]
    fn bad_polling_mode_fails() {
        let file = write_config(
            "[TRIANGULAR_ARB_STRATEGY]\nstartingAsset = USDT\n[PERFORMANCE]\npollingMode = adaptive\n",
        );
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn out_of_range_risk_fails() {
        let file = write_config("[TRIANGULAR_ARB_STRATEGY]\nstartingAsset = USDT\nrisk = 1.5\n");
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn live_mode_requires_credentials() {
        let file = write_config("[TRIANGULAR_ARB_STRATEGY]\nstartingAsset = USDT\nliveMode = true\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("apiKey"));
    }
}

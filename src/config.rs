//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::address::Address;
use crate::market::LedgerOptions;
use crate::oracle::OracleOptions;

/// Program id used when `PROGRAM_ID` is not set.
pub const DEFAULT_PROGRAM_ID: &str =
    "0x9a3f6c0e5d1b7a24c8e0f35b6d2a91c47e8b5f03a6d9c12e74b0f8a35c6e1d27";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Ledger ===
    /// Program id mixed into every derived address (hex, 32 bytes).
    #[serde(default = "default_program_id")]
    pub program_id: String,

    /// Timeout around every store call, in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Allow the creator to resolve before the end time.
    #[serde(default)]
    pub allow_early_resolution: bool,

    // === Oracle ===
    /// Oracle cache TTL in seconds.
    #[serde(default = "default_oracle_cache_ttl_secs")]
    pub oracle_cache_ttl_secs: u64,

    /// Minimum assertion confidence accepted at resolution.
    #[serde(default = "default_oracle_min_confidence")]
    pub oracle_min_confidence: f32,

    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_program_id() -> String {
    DEFAULT_PROGRAM_ID.to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    2_000
}

fn default_oracle_cache_ttl_secs() -> u64 {
    30
}

fn default_oracle_min_confidence() -> f32 {
    0.5
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            allow_early_resolution: false,
            oracle_cache_ttl_secs: default_oracle_cache_ttl_secs(),
            oracle_min_confidence: default_oracle_min_confidence(),
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        self.program_address()?;

        if self.rpc_timeout_ms == 0 {
            return Err("RPC_TIMEOUT_MS must be greater than 0".to_string());
        }

        if self.oracle_cache_ttl_secs == 0 {
            return Err("ORACLE_CACHE_TTL_SECS must be greater than 0".to_string());
        }

        if !(0.0..=1.0).contains(&self.oracle_min_confidence) {
            return Err("ORACLE_MIN_CONFIDENCE must be between 0 and 1".to_string());
        }

        Ok(())
    }

    /// Parsed program id.
    pub fn program_address(&self) -> Result<Address, String> {
        Address::from_str(&self.program_id).map_err(|e| format!("PROGRAM_ID is invalid: {e}"))
    }

    /// Options for the market ledger.
    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
            allow_early_resolution: self.allow_early_resolution,
            oracle_min_confidence: self.oracle_min_confidence,
        }
    }

    /// Options for the oracle reader.
    pub fn oracle_options(&self) -> OracleOptions {
        OracleOptions {
            cache_ttl: Duration::from_secs(self.oracle_cache_ttl_secs),
            rpc_timeout: Duration::from_millis(self.rpc_timeout_ms),
        }
    }
}

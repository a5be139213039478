//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use faceid_ledger::LedgerTimeouts;
use faceid_types::DEFAULT_DESCRIPTOR_LEN;
use faceid_utils::LogFormat;

use crate::EngineError;

/// Configuration for the identity engine and the processes hosting it.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the LMDB identity store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of elements in every descriptor of this deployment.
    #[serde(default = "default_descriptor_len")]
    pub descriptor_len: usize,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// HTTP API port.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Whether to serve Prometheus metrics at `/metrics`.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// How to reach the ledger, and how long to wait for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Without a ledger every registration is stored `local_only`.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL of the ledger node.
    #[serde(default = "default_ledger_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Bound on the whole registration (cost estimate plus submission).
    #[serde(default = "default_register_timeout_ms")]
    pub register_timeout_ms: u64,

    /// Refuse ledger writes whose estimated cost exceeds this.
    #[serde(default)]
    pub max_registration_cost: Option<u64>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./faceid_data")
}

fn default_descriptor_len() -> usize {
    DEFAULT_DESCRIPTOR_LEN
}

fn default_map_size_mb() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rpc_port() -> u16 {
    7490
}

fn default_true() -> bool {
    true
}

fn default_ledger_endpoint() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_call_timeout_ms() -> u64 {
    2_000
}

fn default_register_timeout_ms() -> u64 {
    3_000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.descriptor_len == 0 {
            return Err(EngineError::Config("descriptor_len must be positive".to_string()));
        }
        if self.map_size_mb == 0 {
            return Err(EngineError::Config("map_size_mb must be positive".to_string()));
        }
        if self.ledger.enabled && self.ledger.endpoint.trim().is_empty() {
            return Err(EngineError::Config(
                "ledger.endpoint is required when the ledger is enabled".to_string(),
            ));
        }
        Ok(())
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}

impl LedgerConfig {
    pub fn timeouts(&self) -> LedgerTimeouts {
        LedgerTimeouts {
            call: Duration::from_millis(self.call_timeout_ms),
            register: Duration::from_millis(self.register_timeout_ms),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            descriptor_len: default_descriptor_len(),
            map_size_mb: default_map_size_mb(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            rpc_port: default_rpc_port(),
            enable_metrics: false,
            ledger: LedgerConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            endpoint: default_ledger_endpoint(),
            call_timeout_ms: default_call_timeout_ms(),
            register_timeout_ms: default_register_timeout_ms(),
            max_registration_cost: None,
        }
    }
}

//! Configuration system for the burst datapath.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BURST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/burst/config.toml
//!   3. ~/.config/burst/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::PKT_HDR_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatapathConfig {
    pub wire: WireConfig,
    pub mempool: MempoolConfig,
    pub tx: TxConfig,
    pub rx: RxConfig,
    pub checks: ChecksConfig,
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Largest packet the datapath emits, headers included.
    pub mtu: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Driver buffers in the per-queue pool. Shared by tx and rx.
    pub num_mbufs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TxConfig {
    /// Ceiling on descriptors per transmit call.
    pub max_batch: usize,
    /// Retries of a partially accepted batch between "stuck" warnings.
    pub stall_warn_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RxConfig {
    /// Packets pulled from the NIC per poll.
    pub batch_size: usize,
    /// Receive ring slots. Must exceed the number of received buffers the
    /// layer above can hold unreleased.
    pub ring_entries: usize,
}

/// Hot-path invariant checks. `None` means "on in debug builds".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksConfig {
    /// Treat received frames not addressed to this endpoint as fatal.
    pub validate_rx_identity: Option<bool>,
    /// Run buffer sanity checks when releasing receive buffers.
    pub mbuf_sanity: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Payload bytes per probe message.
    pub msg_size: usize,
    /// Messages sent through the loopback port.
    pub rounds: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for DatapathConfig {
    fn default() -> Self {
        Self {
            wire: WireConfig::default(),
            mempool: MempoolConfig::default(),
            tx: TxConfig::default(),
            rx: RxConfig::default(),
            checks: ChecksConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self { mtu: 1024 }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self { num_mbufs: 8192 }
    }
}

impl Default for TxConfig {
    fn default() -> Self {
        Self {
            max_batch: 32,
            stall_warn_interval: 1_000_000_000,
        }
    }
}

impl Default for RxConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            ring_entries: 4096,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            msg_size: 3000,
            rounds: 1000,
        }
    }
}

impl WireConfig {
    /// Payload bytes that fit in one packet after the header.
    pub fn max_data_per_pkt(&self) -> usize {
        self.mtu.saturating_sub(PKT_HDR_SIZE)
    }
}

impl ChecksConfig {
    pub fn validate_rx_identity(&self) -> bool {
        self.validate_rx_identity.unwrap_or(cfg!(debug_assertions))
    }

    pub fn mbuf_sanity(&self) -> bool {
        self.mbuf_sanity.unwrap_or(cfg!(debug_assertions))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("burst")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DatapathConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::file_path())
    }

    /// Load from an explicit file (if present), then apply env overrides.
    pub fn load_from(path: PathBuf) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            DatapathConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BURST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&DatapathConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BURST_* overrides. `lookup` maps a variable name to its value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<usize>().ok());
        let flag = |key: &str| lookup(key).map(|v| v == "true" || v == "1");

        if let Some(v) = parsed("BURST_WIRE__MTU") {
            self.wire.mtu = v;
        }
        if let Some(v) = parsed("BURST_MEMPOOL__NUM_MBUFS") {
            self.mempool.num_mbufs = v;
        }
        if let Some(v) = parsed("BURST_TX__MAX_BATCH") {
            self.tx.max_batch = v;
        }
        if let Some(v) = parsed("BURST_RX__BATCH_SIZE") {
            self.rx.batch_size = v;
        }
        if let Some(v) = parsed("BURST_RX__RING_ENTRIES") {
            self.rx.ring_entries = v;
        }
        if let Some(v) = flag("BURST_CHECKS__VALIDATE_RX_IDENTITY") {
            self.checks.validate_rx_identity = Some(v);
        }
        if let Some(v) = flag("BURST_CHECKS__MBUF_SANITY") {
            self.checks.mbuf_sanity = Some(v);
        }
    }
}

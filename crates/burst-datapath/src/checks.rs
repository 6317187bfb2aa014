//! Hot-path invariant checks that can be compiled in or switched off.

use burst_core::config::ChecksConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checks {
    /// Received frames must be addressed to the local endpoint.
    pub validate_rx_identity: bool,
    /// Released receive buffers must pass `Mbuf::sanity_check`.
    pub mbuf_sanity: bool,
}

impl Checks {
    pub fn from_config(config: &ChecksConfig) -> Self {
        Self {
            validate_rx_identity: config.validate_rx_identity(),
            mbuf_sanity: config.mbuf_sanity(),
        }
    }
}

impl Default for Checks {
    fn default() -> Self {
        Self::from_config(&ChecksConfig::default())
    }
}

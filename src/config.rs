/*!
Runtime configuration for the protocol engines.

Both engines work with their defaults; the knobs here bound resource use
when frames come from an untrusted transport.
*/

use crate::{
    constants::DEFAULT_MAX_PAYLOAD,
    error::{Error, Result},
};

#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// Smallest payload limit that still fits every handshake frame
pub const MIN_PAYLOAD_LIMIT: usize = 512;

/// Largest payload limit (the header length field is 32 bits)
pub const MAX_PAYLOAD_LIMIT: usize = u32::MAX as usize;

/// Configuration for a secure session
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct SessionConfig {
    /// Maximum sealed payload length accepted or produced, tag included
    pub max_payload_len: usize,
    /// Maximum identity length accepted from a peer
    pub max_identity_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD,
            max_identity_len: 1024,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for constrained peers exchanging small messages
    pub fn lightweight() -> Self {
        Self {
            max_payload_len: 4096,
            max_identity_len: 256,
        }
    }

    /// Configuration for bulk transfers
    pub fn high_throughput() -> Self {
        Self {
            max_payload_len: 16 * 1024 * 1024,
            max_identity_len: 1024,
        }
    }

    /// Set the maximum payload length
    pub fn with_max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_payload_len < MIN_PAYLOAD_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "max_payload_len must be at least {}",
                MIN_PAYLOAD_LIMIT
            )));
        }
        if self.max_payload_len > MAX_PAYLOAD_LIMIT {
            return Err(Error::InvalidConfig(
                "max_payload_len does not fit the frame header".into(),
            ));
        }
        if self.max_identity_len == 0 {
            return Err(Error::InvalidConfig("max_identity_len must be non-zero".into()));
        }
        // ConnectRequest carries identity, key, signature and two length prefixes
        if self
            .max_identity_len
            .checked_add(128)
            .is_none_or(|needed| needed > self.max_payload_len)
        {
            return Err(Error::InvalidConfig(
                "max_identity_len does not fit into a handshake frame".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for a secure comparator
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct ComparatorConfig {
    /// Maximum total secret length accepted by `new` and `append_secret`
    pub max_secret_len: usize,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        Self {
            max_secret_len: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ComparatorConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_secret_len == 0 {
            return Err(Error::InvalidConfig("max_secret_len must be non-zero".into()));
        }
        Ok(())
    }
}

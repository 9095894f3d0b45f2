//! Neighbor configuration types.
//!
//! Known neighbor domains, pre-populated into the duplicate-detection store
//! at startup.

use serde::{Deserialize, Serialize};

use crate::identity::DomainId;
use crate::mac::MacKey;

/// Configuration for a known neighbor domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NeighborConfig {
    /// The neighbor's ISD-AS identifier, e.g. "1-ff00:0:111".
    pub domain: DomainId,

    /// Shared AES-128 MAC key as 32 hex characters.
    ///
    /// Neighbors without a key get an all-zero placeholder until one is
    /// provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<MacKey>,

    /// Human-readable alias (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl NeighborConfig {
    /// Create a neighbor config without a key.
    pub fn new(domain: DomainId) -> Self {
        Self {
            domain,
            key: None,
            alias: None,
        }
    }

    /// Set the shared MAC key.
    pub fn with_key(mut self, key: MacKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Set an alias for the neighbor.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Alias if set, otherwise the domain identifier.
    pub fn display_name(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.domain.to_string())
    }
}

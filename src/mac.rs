//! Per-hop message authentication.
//!
//! Each hop slot of the extension carries an AES-128 CMAC tag computed with
//! the symmetric key shared between the originating domain and that hop's
//! domain. Tags are compared in constant time.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use cmac::{Cmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Size of a MAC key (AES-128).
pub const MAC_KEY_SIZE: usize = 16;

/// Size of a MAC tag.
pub const MAC_SIZE: usize = 16;

/// Cipher block size; canonical MAC input is truncated to a multiple of it.
pub const CIPHER_BLOCK_SIZE: usize = 16;

/// A per-hop authentication tag.
pub type MacTag = [u8; MAC_SIZE];

/// Errors from parsing MAC keys.
#[derive(Debug, Error, PartialEq)]
pub enum MacKeyError {
    #[error("invalid hex key: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("key must be {MAC_KEY_SIZE} bytes, got {0}")]
    InvalidLength(usize),
}

/// Symmetric key shared with one neighbor domain.
///
/// Serialized as lowercase hex in configuration files.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacKey([u8; MAC_KEY_SIZE]);

impl MacKey {
    pub fn from_bytes(bytes: [u8; MAC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// All-zero key used for neighbors with no provisioned key.
    pub fn placeholder() -> Self {
        Self([0u8; MAC_KEY_SIZE])
    }

    /// Generate a random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; MAC_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == [0u8; MAC_KEY_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; MAC_KEY_SIZE] {
        &self.0
    }

    fn cmac(&self) -> Cmac<Aes128> {
        <Cmac<Aes128> as cmac::digest::KeyInit>::new(GenericArray::from_slice(&self.0))
    }
}

impl FromStr for MacKey {
    type Err = MacKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let bytes: [u8; MAC_KEY_SIZE] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| MacKeyError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for MacKey {
    type Error = MacKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacKey> for String {
    fn from(key: MacKey) -> Self {
        hex::encode(key.0)
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacKey(<redacted>)")
    }
}

/// Compute the CMAC tag of `data` under `key`.
pub fn compute_mac(key: &MacKey, data: &[u8]) -> MacTag {
    let mut mac = key.cmac();
    mac.update(data);
    let bytes = mac.finalize().into_bytes();

    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&bytes);
    tag
}

/// Check `tag` against the expected tag of `data` in constant time.
pub fn verify_mac(key: &MacKey, data: &[u8], tag: &[u8]) -> bool {
    let expected = compute_mac(key, data);
    bool::from(expected.as_slice().ct_eq(tag))
}

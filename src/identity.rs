//! Domain identifiers.
//!
//! Every neighbor is keyed by a fixed-width 64-bit ISD-AS identifier: the top
//! 16 bits carry the isolation domain, the low 48 bits the AS number. The
//! wire form is 8 bytes big-endian, so a path hop field decodes without any
//! delimiter scanning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Size of a domain identifier on the wire.
pub const DOMAIN_ID_SIZE: usize = 8;

/// Largest AS number that fits the 48-bit field.
pub const MAX_ASN: u64 = (1 << 48) - 1;

/// AS numbers up to this value are printed in decimal (BGP compatible).
const MAX_BGP_ASN: u64 = u32::MAX as u64;

/// Errors from parsing domain identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainIdError {
    #[error("missing '-' between ISD and AS in {0:?}")]
    MissingSeparator(String),

    #[error("invalid ISD number: {0:?}")]
    InvalidIsd(String),

    #[error("invalid AS number: {0:?}")]
    InvalidAsn(String),

    #[error("AS number {0:#x} exceeds 48 bits")]
    AsnOutOfRange(u64),
}

/// Identifier of an inter-domain neighbor (ISD-AS pair).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainId(u64);

impl DomainId {
    /// Build an identifier from its ISD and AS parts.
    pub fn new(isd: u16, asn: u64) -> Result<Self, DomainIdError> {
        if asn > MAX_ASN {
            return Err(DomainIdError::AsnOutOfRange(asn));
        }
        Ok(Self(((isd as u64) << 48) | asn))
    }

    /// Reinterpret a raw 64-bit value.
    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    /// Decode the 8-byte big-endian wire form.
    pub fn from_bytes(bytes: [u8; DOMAIN_ID_SIZE]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }

    /// Encode to the 8-byte big-endian wire form.
    pub fn to_bytes(self) -> [u8; DOMAIN_ID_SIZE] {
        self.0.to_be_bytes()
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Isolation domain number.
    pub fn isd(self) -> u16 {
        (self.0 >> 48) as u16
    }

    /// AS number (48 bits).
    pub fn asn(self) -> u64 {
        self.0 & MAX_ASN
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let asn = self.asn();
        if asn <= MAX_BGP_ASN {
            write!(f, "{}-{}", self.isd(), asn)
        } else {
            write!(
                f,
                "{}-{:x}:{:x}:{:x}",
                self.isd(),
                (asn >> 32) & 0xffff,
                (asn >> 16) & 0xffff,
                asn & 0xffff
            )
        }
    }
}

impl FromStr for DomainId {
    type Err = DomainIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (isd, asn) = s
            .split_once('-')
            .ok_or_else(|| DomainIdError::MissingSeparator(s.to_string()))?;

        let isd: u16 = isd
            .parse()
            .map_err(|_| DomainIdError::InvalidIsd(isd.to_string()))?;

        let asn = if asn.contains(':') {
            parse_hex_asn(asn)?
        } else {
            asn.parse::<u64>()
                .map_err(|_| DomainIdError::InvalidAsn(asn.to_string()))?
        };

        Self::new(isd, asn)
    }
}

/// Parse the `ffff:ffff:ffff` AS notation.
fn parse_hex_asn(s: &str) -> Result<u64, DomainIdError> {
    let groups: Vec<&str> = s.split(':').collect();
    if groups.len() != 3 {
        return Err(DomainIdError::InvalidAsn(s.to_string()));
    }

    let mut asn = 0u64;
    for group in groups {
        if group.is_empty() || group.len() > 4 {
            return Err(DomainIdError::InvalidAsn(s.to_string()));
        }
        let value =
            u16::from_str_radix(group, 16).map_err(|_| DomainIdError::InvalidAsn(s.to_string()))?;
        asn = (asn << 16) | value as u64;
    }
    Ok(asn)
}

impl TryFrom<String> for DomainId {
    type Error = DomainIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DomainId> for String {
    fn from(id: DomainId) -> Self {
        id.to_string()
    }
}

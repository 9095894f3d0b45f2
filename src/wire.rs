//! Wire Format of the Sequence Number Extension
//!
//! Hop-by-hop extension carried by every inter-domain packet. The first
//! line holds the sequence number and the hop counter; one two-line slot
//! per authenticated hop follows.
//!
//! ```text
//!  0        4    5    6        8
//! +--------+----+----+--------+
//! | seq BE |hop |rsv | rsv    |   first line
//! +--------+----+----+--------+
//! | MAC tag hop 0 (16 bytes)  |   slot 0 (2 lines)
//! +---------------------------+
//! | MAC tag hop 1 (16 bytes)  |   slot 1
//! +---------------------------+
//! ```
//!
//! The path header carries one fixed-width 8-byte domain identifier per
//! hop, in hop order.

use std::ops::Range;
use thiserror::Error;

use crate::identity::{DomainId, DOMAIN_ID_SIZE};
use crate::mac::{MacTag, CIPHER_BLOCK_SIZE, MAC_SIZE};

// ============================================================================
// Constants
// ============================================================================

/// Length of one header line.
pub const LINE_LEN: usize = 8;

/// Length of the extension's first line.
pub const FIRST_LINE_LEN: usize = 8;

/// Length of one per-hop MAC slot (two lines).
pub const HOP_SLOT_LEN: usize = 2 * LINE_LEN;

/// Offset of the big-endian sequence number.
pub const SEQ_OFFSET: usize = 0;

/// Offset of the hop counter byte.
pub const HOP_COUNTER_OFFSET: usize = 4;

/// Offset of the reserved byte zeroed before MAC computation.
pub const MUTABLE_RESERVED_OFFSET: usize = 5;

/// Width of one path hop field.
pub const PATH_HOP_FIELD_LEN: usize = DOMAIN_ID_SIZE;

const _: () = assert!(HOP_SLOT_LEN == MAC_SIZE);

/// Extension length for a given hop count.
pub const fn extension_len(hops: usize) -> usize {
    FIRST_LINE_LEN + hops * HOP_SLOT_LEN
}

/// Errors from parsing the extension or its surrounding headers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("extension too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("extension length {len} is not first line plus whole hop slots")]
    InconsistentLength { len: usize },

    #[error("hop counter {hop} out of range for {hops} hops")]
    HopOutOfRange { hop: u8, hops: usize },

    #[error("too many hops for an 8-bit hop counter: {0}")]
    TooManyHops(usize),

    #[error("path region of {len} bytes is not a whole number of hop fields")]
    PathLength { len: usize },

    #[error("path lists {path} hops but extension has {ext} slots")]
    PathHopMismatch { path: usize, ext: usize },

    #[error("header offsets out of order or beyond packet of {packet_len} bytes")]
    InvalidOffsets { packet_len: usize },
}

// ============================================================================
// Header Offsets
// ============================================================================

/// Pre-computed header offsets within a packet buffer.
///
/// Supplied by the packet framework; `path` is the path header region and
/// `extension` the byte range of this extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderOffsets {
    pub path: Range<usize>,
    pub extension: Range<usize>,
}

impl HeaderOffsets {
    pub fn new(path: Range<usize>, extension: Range<usize>) -> Self {
        Self { path, extension }
    }

    /// Check ordering: path precedes the extension, both inside the packet.
    pub fn validate(&self, packet_len: usize) -> Result<(), WireError> {
        let ordered = self.path.start <= self.path.end
            && self.path.end <= self.extension.start
            && self.extension.start <= self.extension.end
            && self.extension.end <= packet_len;
        if ordered {
            Ok(())
        } else {
            Err(WireError::InvalidOffsets { packet_len })
        }
    }
}

// ============================================================================
// Extension View
// ============================================================================

/// Mutable view over the sequence number extension bytes.
#[derive(Debug)]
pub struct SeqNumExt<'a> {
    raw: &'a mut [u8],
    hops: usize,
}

impl<'a> SeqNumExt<'a> {
    /// Parse the extension in place.
    ///
    /// Hop count is `(len - FIRST_LINE_LEN) / HOP_SLOT_LEN` and must be at
    /// least one with no trailing partial slot.
    pub fn parse(raw: &'a mut [u8]) -> Result<Self, WireError> {
        let hops = hop_count(raw.len())?;
        Ok(Self { raw, hops })
    }

    /// Number of hop slots.
    pub fn hop_count(&self) -> usize {
        self.hops
    }

    pub fn seq(&self) -> u32 {
        let b = &self.raw[SEQ_OFFSET..SEQ_OFFSET + 4];
        u32::from_be_bytes([b[0], b[1], b[2], b[3]])
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.raw[SEQ_OFFSET..SEQ_OFFSET + 4].copy_from_slice(&seq.to_be_bytes());
    }

    /// Index of the hop currently processing the packet.
    pub fn current_hop(&self) -> u8 {
        self.raw[HOP_COUNTER_OFFSET]
    }

    pub fn set_current_hop(&mut self, hop: u8) {
        self.raw[HOP_COUNTER_OFFSET] = hop;
    }

    /// Mark the current hop as traversed.
    pub fn increment_hop(&mut self) {
        self.raw[HOP_COUNTER_OFFSET] = self.raw[HOP_COUNTER_OFFSET].wrapping_add(1);
    }

    /// Tag stored in slot `hop`.
    pub fn mac_slot(&self, hop: usize) -> Option<&[u8]> {
        (hop < self.hops).then(|| &self.raw[slot_range(hop)])
    }

    /// Write a tag into slot `hop`.
    pub fn set_mac_slot(&mut self, hop: usize, tag: &MacTag) -> Result<(), WireError> {
        if hop >= self.hops {
            return Err(WireError::HopOutOfRange {
                hop: hop.min(u8::MAX as usize) as u8,
                hops: self.hops,
            });
        }
        self.raw[slot_range(hop)].copy_from_slice(tag);
        Ok(())
    }

    /// First line with the mutable bytes zeroed.
    pub fn canonical_first_line(&self) -> [u8; FIRST_LINE_LEN] {
        let mut line = [0u8; FIRST_LINE_LEN];
        line.copy_from_slice(&self.raw[..FIRST_LINE_LEN]);
        line[HOP_COUNTER_OFFSET] = 0;
        line[MUTABLE_RESERVED_OFFSET] = 0;
        line
    }

    /// The full extension bytes (sequence number plus every slot).
    pub fn as_bytes(&self) -> &[u8] {
        self.raw
    }
}

fn slot_range(hop: usize) -> Range<usize> {
    let start = FIRST_LINE_LEN + hop * HOP_SLOT_LEN;
    start..start + HOP_SLOT_LEN
}

/// Derive the hop count from an extension length.
pub fn hop_count(len: usize) -> Result<usize, WireError> {
    let min = extension_len(1);
    if len < min {
        return Err(WireError::TooShort { len, min });
    }
    if (len - FIRST_LINE_LEN) % HOP_SLOT_LEN != 0 {
        return Err(WireError::InconsistentLength { len });
    }
    let hops = (len - FIRST_LINE_LEN) / HOP_SLOT_LEN;
    if hops > u8::MAX as usize {
        return Err(WireError::TooManyHops(hops));
    }
    Ok(hops)
}

// ============================================================================
// Path Hops
// ============================================================================

/// Decode the per-hop domain identifiers from the path region.
pub fn decode_path_hops(path: &[u8]) -> Result<Vec<DomainId>, WireError> {
    if path.len() % PATH_HOP_FIELD_LEN != 0 {
        return Err(WireError::PathLength { len: path.len() });
    }
    Ok(path
        .chunks_exact(PATH_HOP_FIELD_LEN)
        .map(|field| {
            let mut bytes = [0u8; PATH_HOP_FIELD_LEN];
            bytes.copy_from_slice(field);
            DomainId::from_bytes(bytes)
        })
        .collect())
}

/// Encode per-hop domain identifiers into a path region.
pub fn encode_path_hops(hops: &[DomainId]) -> Vec<u8> {
    hops.iter().flat_map(|id| id.to_bytes()).collect()
}

// ============================================================================
// Canonical MAC Input
// ============================================================================

/// Build the byte string every hop tag is computed over.
///
/// Concatenates the extension first line (hop counter and reserved byte
/// zeroed), the packet bytes before the path header, and the bytes between
/// the path header and the extension. The result is truncated to a whole
/// number of cipher blocks once it spans at least one block.
pub fn canonical_mac_input(
    first_line: &[u8; FIRST_LINE_LEN],
    packet: &[u8],
    offsets: &HeaderOffsets,
) -> Vec<u8> {
    let pre_path = &packet[..offsets.path.start];
    let post_path = &packet[offsets.path.end..offsets.extension.start];

    let mut buf = Vec::with_capacity(FIRST_LINE_LEN + pre_path.len() + post_path.len());
    buf.extend_from_slice(first_line);
    buf.extend_from_slice(pre_path);
    buf.extend_from_slice(post_path);

    if buf.len() >= CIPHER_BLOCK_SIZE {
        buf.truncate(buf.len() - buf.len() % CIPHER_BLOCK_SIZE);
    }
    buf
}

//! Sequence Number Extension Processor
//!
//! Per-packet entry point invoked by the router's extension hook chain.
//! The processor takes one of three roles depending on the packet context:
//!
//! - **Stamp**: a packet leaving its originating domain over an
//!   inter-domain link gets the local sequence number and one MAC per path
//!   hop, each keyed with the secret shared with that hop's domain.
//! - **Verify**: a packet crossing an inter-domain link into this domain is
//!   authenticated against the slot at the current hop counter, its
//!   sequence number is checked against the source's window, and its
//!   extension bytes are run through the duplicate cache.
//! - **Skip**: anything else (intra-domain hops, including those of the
//!   originating domain, and transit egress) passes through untouched.
//!
//! Every error is scoped to the one packet: [`SeqNumProcessor::handle`]
//! turns it into [`HookResult::Drop`] and processing of other packets
//! continues.

mod stats;

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, trace};

use crate::digest::DigestStore;
use crate::identity::DomainId;
use crate::mac::{compute_mac, verify_mac};
use crate::seqnum::SeqCheck;
use crate::wire::{
    FIRST_LINE_LEN, HeaderOffsets, SeqNumExt, WireError, canonical_mac_input, decode_path_hops,
};

pub use stats::{ProcessorStats, ProcessorStatsSnapshot};

/// Which way the packet is crossing this node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ingress,
    Egress,
}

/// Kind of link the packet arrived on or leaves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// Boundary between two domains; authenticated.
    InterDomain,
    /// Hop inside one domain; never checked.
    IntraDomain,
}

/// Per-packet context supplied by the hook framework.
#[derive(Clone, Debug)]
pub struct PacketContext {
    /// Domain the packet originated in.
    pub src: DomainId,
    /// This router's domain.
    pub local: DomainId,
    pub direction: Direction,
    pub link: LinkKind,
    pub offsets: HeaderOffsets,
}

/// Packet-scoped processing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    #[error("MAC mismatch from {src} at hop {hop}")]
    AuthenticationFailed { src: DomainId, hop: u8 },

    #[error("sequence {seq} from {src} outside window of {stored}")]
    SequenceOutOfWindow { src: DomainId, seq: u32, stored: u32 },

    #[error("duplicate packet from {src} with sequence {seq}")]
    DuplicateDetected { src: DomainId, seq: u32 },

    #[error("malformed extension: {0}")]
    MalformedExtension(#[from] WireError),
}

/// How an accepted packet's sequence number related to the stored mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqVerdict {
    /// First packet from this neighbor; seeded the mark.
    FirstContact,
    /// Moved the mark forward.
    Advanced,
    /// Inside the window behind the mark.
    InWindow,
}

/// Successful per-packet outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Stamped { seq: u32, hops: usize },
    Verified { seq: u32, verdict: SeqVerdict },
    Skipped,
}

/// Decision handed back to the hook chain.
#[derive(Debug, PartialEq, Eq)]
pub enum HookResult {
    Continue,
    Drop(ProcessError),
}

impl HookResult {
    pub fn is_continue(&self) -> bool {
        matches!(self, HookResult::Continue)
    }
}

/// The extension processor. Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct SeqNumProcessor {
    store: Arc<DigestStore>,
    stats: Arc<ProcessorStats>,
}

impl SeqNumProcessor {
    pub fn new(store: Arc<DigestStore>) -> Self {
        Self {
            store,
            stats: Arc::new(ProcessorStats::new()),
        }
    }

    pub fn store(&self) -> &Arc<DigestStore> {
        &self.store
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Hook entry point: process, record stats, and map errors to drops.
    pub fn handle(&self, packet: &mut [u8], ctx: &PacketContext) -> HookResult {
        let start = Instant::now();
        let result = self.process(packet, ctx);
        self.stats.record_processing_time(start.elapsed());

        match result {
            Ok(outcome) => {
                self.record_outcome(outcome);
                HookResult::Continue
            }
            Err(err) => {
                debug!(src = %ctx.src, error = %err, "Dropping packet");
                self.stats.record_drop(&err);
                HookResult::Drop(err)
            }
        }
    }

    /// Run the role selected by `ctx` over `packet`.
    ///
    /// On error the packet buffer may have been partially modified (the hop
    /// counter is advanced before the MAC comparison) and must be discarded.
    pub fn process(&self, packet: &mut [u8], ctx: &PacketContext) -> Result<Outcome, ProcessError> {
        ctx.offsets.validate(packet.len())?;

        match (ctx.direction, ctx.link) {
            (Direction::Egress, LinkKind::InterDomain) if ctx.src == ctx.local => {
                self.stamp(packet, &ctx.offsets)
            }
            (Direction::Ingress, LinkKind::InterDomain) if ctx.src != ctx.local => {
                self.verify(packet, ctx)
            }
            _ => {
                trace!(src = %ctx.src, direction = ?ctx.direction, link = ?ctx.link, "Skipping checks");
                Ok(Outcome::Skipped)
            }
        }
    }

    fn stamp(&self, packet: &mut [u8], offsets: &HeaderOffsets) -> Result<Outcome, ProcessError> {
        let path_hops = decode_path_hops(&packet[offsets.path.clone()])?;

        let (head, tail) = packet.split_at_mut(offsets.extension.start);
        let mut ext = SeqNumExt::parse(&mut tail[..offsets.extension.len()])?;
        if path_hops.len() != ext.hop_count() {
            return Err(WireError::PathHopMismatch {
                path: path_hops.len(),
                ext: ext.hop_count(),
            }
            .into());
        }

        let seq = self.store.local_sequence();
        ext.set_seq(seq);
        ext.set_current_hop(0);

        let input = canonical_mac_input(&ext.canonical_first_line(), head, offsets);
        for (hop, domain) in path_hops.iter().enumerate() {
            let key = self.store.add_neighbor(*domain).lock().key().clone();
            ext.set_mac_slot(hop, &compute_mac(&key, &input))?;
        }

        trace!(seq, hops = path_hops.len(), "Stamped packet");
        Ok(Outcome::Stamped {
            seq,
            hops: path_hops.len(),
        })
    }

    fn verify(&self, packet: &mut [u8], ctx: &PacketContext) -> Result<Outcome, ProcessError> {
        let offsets = &ctx.offsets;
        let src = ctx.src;
        let (head, tail) = packet.split_at_mut(offsets.extension.start);
        let mut ext = SeqNumExt::parse(&mut tail[..offsets.extension.len()])?;

        let space = *self.store.seq_space();
        let seq = space.reduce(ext.seq());
        let key = self.store.lookup_key(src);

        // Authenticate the slot for this hop, then mark the hop traversed.
        let first_line = ext.canonical_first_line();
        let input = canonical_mac_input(&first_line, head, offsets);
        let hop = ext.current_hop();
        let tag = ext.mac_slot(hop as usize).ok_or(WireError::HopOutOfRange {
            hop,
            hops: ext.hop_count(),
        })?;
        let authentic = verify_mac(&key, &input, tag);
        ext.increment_hop();
        if !authentic {
            return Err(ProcessError::AuthenticationFailed { src, hop });
        }

        // Digest covers the sequence number and every hop slot, not the
        // hop counter.
        let mut digest = first_line.to_vec();
        digest.extend_from_slice(&ext.as_bytes()[FIRST_LINE_LEN..]);

        // Only authenticated sources get a neighbor entry.
        let neighbor = self.store.add_neighbor(src);
        let mut entry = neighbor.lock();
        let verdict = if !entry.is_valid() {
            SeqVerdict::FirstContact
        } else {
            match space.check(seq, entry.seq_num()) {
                SeqCheck::Ahead => SeqVerdict::Advanced,
                SeqCheck::InWindow => SeqVerdict::InWindow,
                SeqCheck::OutOfWindow => {
                    return Err(ProcessError::SequenceOutOfWindow {
                        src,
                        seq,
                        stored: entry.seq_num(),
                    });
                }
            }
        };

        if self.store.check_and_add(&digest) {
            return Err(ProcessError::DuplicateDetected { src, seq });
        }

        if verdict != SeqVerdict::InWindow {
            self.store.accept_sequence(&mut entry, seq);
        }

        trace!(src = %src, seq, ?verdict, "Verified packet");
        Ok(Outcome::Verified { seq, verdict })
    }

    fn record_outcome(&self, outcome: Outcome) {
        match outcome {
            Outcome::Stamped { .. } => self.stats.record_stamped(),
            Outcome::Skipped => self.stats.record_skipped(),
            Outcome::Verified { verdict, .. } => {
                self.stats.record_verified();
                match verdict {
                    SeqVerdict::FirstContact => self.stats.record_first_contact(),
                    SeqVerdict::Advanced => self.stats.record_window_advanced(),
                    SeqVerdict::InWindow => {}
                }
            }
        }
    }
}

//! seqnum-guard: replay suppression and per-hop authentication for a
//! hop-by-hop sequence number extension.
//!
//! Every inter-domain packet carries a sequence number and one MAC per
//! traversed hop. Forwarding nodes verify the MAC for their hop, check the
//! sequence number against a sliding window per source domain, and drop
//! exact duplicates using a rotating blocked Bloom filter.

pub mod bloom;
pub mod config;
pub mod digest;
pub mod identity;
pub mod mac;
pub mod maintenance;
pub mod processor;
pub mod seqnum;
pub mod wire;

pub use bloom::{BlockedFilter, BlockedFilterSpec, BloomBlock, BloomError};
pub use config::{Config, ConfigError, DigestConfig, NeighborConfig, TimerConfig};
pub use digest::{DigestError, DigestParams, DigestStore, NeighborSnapshot, ShardFill};
pub use identity::{DomainId, DomainIdError};
pub use mac::{MacKey, MacKeyError, compute_mac, verify_mac};
pub use maintenance::{MaintenanceTimers, spawn_all};
pub use processor::{
    Direction, HookResult, LinkKind, Outcome, PacketContext, ProcessError, ProcessorStats,
    ProcessorStatsSnapshot, SeqNumProcessor, SeqVerdict,
};
pub use seqnum::{SeqCheck, SeqSpace};
pub use wire::{HeaderOffsets, SeqNumExt, WireError};

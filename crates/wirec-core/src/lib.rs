//! # wirec-core: Adaptive Wire Compression
//!
//! Replaces the two most repetitive fields of every inter-node message, the
//! recipient actor ref and the payload manifest, with small integer codes.
//! Each remote origin gets its own engine that counts hits, picks heavy
//! hitters, advertises versioned code tables and decodes the codes the peer
//! sends back.

pub mod association;
pub mod config;
pub mod engine;
pub mod error;
pub mod kind;
pub mod outbound;
pub mod protocol;
pub mod registry;
pub mod ring;
pub mod table;
pub mod value;

pub use association::{Association, InboundContext};
pub use config::{CompressionConfig, KindConfig};
pub use engine::{CycleOutcome, EngineSettings, OriginCompressionEngine};
pub use error::CompressionError;
pub use kind::{ActorRefKind, CompressionKind, ManifestKind};
pub use outbound::OutboundCompressions;
pub use protocol::{
    ActorRefCompressionAdvertisement, ActorRefCompressionAdvertisementAck, ControlMessage,
    ManifestCompressionAdvertisement, ManifestCompressionAdvertisementAck,
};
pub use registry::{inbound_compressions, CompressionRegistry, InboundCompressions, NoInboundCompressions};
pub use table::{CodeTable, InverseCodeTable, TableVersion};
pub use value::{ActorRef, Manifest, NodeIdentity};

#[cfg(test)]
mod assertions {
    use super::*;

    static_assertions::assert_impl_all!(NoInboundCompressions: InboundCompressions, Send, Sync);
    static_assertions::assert_impl_all!(OriginCompressionEngine<ActorRefKind>: Send, Sync);
    static_assertions::assert_impl_all!(ControlMessage: Send, Sync, Clone);
}

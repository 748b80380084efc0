//! Per value-kind strategies plugged into the generic engine.

use std::fmt;
use std::hash::Hash;

use crate::protocol::{
    ActorRefCompressionAdvertisement, ControlMessage, ManifestCompressionAdvertisement,
};
use crate::table::{CodeTable, TableVersion};
use crate::value::{ActorRef, Manifest, NodeIdentity};

/// What differs between compressing actor refs and compressing manifests.
///
/// Implementors are zero-sized markers; every call is statically dispatched.
pub trait CompressionKind: 'static {
    type Value: Clone + Eq + Hash + fmt::Debug + Send + Sync;

    /// Label used in log lines.
    const NAME: &'static str;

    /// Whether a hit on `value` should be counted at all.
    fn should_count(value: &Self::Value) -> bool;

    /// Builds the next table from the current heavy hitters.
    fn build_table<'a, I>(origin_id: u64, version: TableVersion, heavy_hitters: I) -> CodeTable<Self::Value>
    where
        I: Iterator<Item = &'a Self::Value>,
        Self::Value: 'a,
    {
        CodeTable::from_values(
            origin_id,
            version,
            heavy_hitters.filter(|v| Self::should_count(v)).cloned(),
        )
    }

    /// Packages a table into the control message the peer expects.
    fn advertisement(from: NodeIdentity, table: CodeTable<Self::Value>) -> ControlMessage;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActorRefKind;

impl CompressionKind for ActorRefKind {
    type Value = ActorRef;
    const NAME: &'static str = "actor ref";

    /// Temporary refs are per-request and would only churn the tracker.
    fn should_count(value: &ActorRef) -> bool {
        !value.is_temporary() && !value.is_dead_letters()
    }

    fn advertisement(from: NodeIdentity, table: CodeTable<ActorRef>) -> ControlMessage {
        ControlMessage::ActorRefAdvertisement(ActorRefCompressionAdvertisement { from, table })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestKind;

impl CompressionKind for ManifestKind {
    type Value = Manifest;
    const NAME: &'static str = "manifest";

    /// Manifests are optional per message; blanks are never counted.
    fn should_count(value: &Manifest) -> bool {
        !value.is_blank()
    }

    fn advertisement(from: NodeIdentity, table: CodeTable<Manifest>) -> ControlMessage {
        ControlMessage::ManifestAdvertisement(ManifestCompressionAdvertisement { from, table })
    }
}

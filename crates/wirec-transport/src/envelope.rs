use bytes::Bytes;
use wirec_core::{ActorRef, Manifest, NodeIdentity, TableVersion};

/// How one compressible header field travels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireField<T> {
    Absent,
    Literal(T),
    Compressed { version: TableVersion, code: u32 },
}

impl<T> WireField<T> {
    pub fn is_compressed(&self) -> bool {
        matches!(self, WireField::Compressed { .. })
    }
}

/// A message header as it arrives from a peer.
#[derive(Clone, Debug)]
pub struct WireEnvelope {
    pub origin: NodeIdentity,
    pub recipient: WireField<ActorRef>,
    pub manifest: WireField<Manifest>,
    pub payload: Bytes,
}

/// A message header with every field resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEnvelope {
    pub origin_id: u64,
    pub recipient: Option<ActorRef>,
    pub manifest: Option<Manifest>,
    pub payload: Bytes,
}

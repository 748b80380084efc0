//! Control messages exchanged between the two ends of an association.

use serde::{Deserialize, Serialize};

use crate::table::{CodeTable, TableVersion};
use crate::value::{ActorRef, Manifest, NodeIdentity};

/// "Here are codes you may use when sending to me."
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActorRefCompressionAdvertisement {
    pub from: NodeIdentity,
    pub table: CodeTable<ActorRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRefCompressionAdvertisementAck {
    pub from: NodeIdentity,
    pub table_version: TableVersion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestCompressionAdvertisement {
    pub from: NodeIdentity,
    pub table: CodeTable<Manifest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCompressionAdvertisementAck {
    pub from: NodeIdentity,
    pub table_version: TableVersion,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    ActorRefAdvertisement(ActorRefCompressionAdvertisement),
    ActorRefAdvertisementAck(ActorRefCompressionAdvertisementAck),
    ManifestAdvertisement(ManifestCompressionAdvertisement),
    ManifestAdvertisementAck(ManifestCompressionAdvertisementAck),
}

impl ControlMessage {
    /// Sender of the message, whichever variant it is.
    pub fn from(&self) -> &NodeIdentity {
        match self {
            ControlMessage::ActorRefAdvertisement(m) => &m.from,
            ControlMessage::ActorRefAdvertisementAck(m) => &m.from,
            ControlMessage::ManifestAdvertisement(m) => &m.from,
            ControlMessage::ManifestAdvertisementAck(m) => &m.from,
        }
    }
}

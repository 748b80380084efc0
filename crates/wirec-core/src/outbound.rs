//! Encode side: tables granted to us by one peer.

use crate::protocol::{
    ActorRefCompressionAdvertisementAck, ControlMessage, ManifestCompressionAdvertisementAck,
};
use crate::table::{CodeTable, TableVersion};
use crate::value::{ActorRef, Manifest, NodeIdentity};

/// Latest actor ref and manifest tables a peer advertised to this node.
///
/// Tables are replaced wholesale. The peer keeps older versions decodable for
/// a while, so messages encoded just before a swap still resolve.
#[derive(Debug)]
pub struct OutboundCompressions {
    local: NodeIdentity,
    actor_refs: CodeTable<ActorRef>,
    manifests: CodeTable<Manifest>,
}

impl OutboundCompressions {
    pub fn new(local: NodeIdentity) -> Self {
        let origin_id = local.origin_id;
        Self {
            local,
            actor_refs: CodeTable::empty(origin_id, TableVersion::DISABLED),
            manifests: CodeTable::empty(origin_id, TableVersion::DISABLED),
        }
    }

    pub fn local(&self) -> &NodeIdentity {
        &self.local
    }

    pub fn actor_ref_table_version(&self) -> TableVersion {
        self.actor_refs.version()
    }

    pub fn manifest_table_version(&self) -> TableVersion {
        self.manifests.version()
    }

    pub fn compress_actor_ref(&self, value: &ActorRef) -> Option<(TableVersion, u32)> {
        self.actor_refs
            .get(value)
            .map(|code| (self.actor_refs.version(), code))
    }

    pub fn compress_manifest(&self, value: &Manifest) -> Option<(TableVersion, u32)> {
        self.manifests
            .get(value)
            .map(|code| (self.manifests.version(), code))
    }

    /// Installs `table` unless it was built for another incarnation of this node.
    pub fn apply_actor_ref_table(&mut self, table: CodeTable<ActorRef>) -> bool {
        if !self.is_for_us(table.origin_id(), "actor ref", table.version()) {
            return false;
        }
        self.actor_refs = table;
        true
    }

    pub fn apply_manifest_table(&mut self, table: CodeTable<Manifest>) -> bool {
        if !self.is_for_us(table.origin_id(), "manifest", table.version()) {
            return false;
        }
        self.manifests = table;
        true
    }

    fn is_for_us(&self, origin_id: u64, kind: &str, version: TableVersion) -> bool {
        if origin_id == self.local.origin_id {
            return true;
        }
        tracing::warn!(
            "Discarding {} table version [{}] built for origin [{}], local origin is [{}]",
            kind,
            version,
            origin_id,
            self.local.origin_id
        );
        false
    }

    /// Applies an advertisement and returns the acknowledgement to send back.
    /// Acks and foreign-incarnation tables yield `None`.
    pub fn handle_control(&mut self, message: ControlMessage) -> Option<ControlMessage> {
        match message {
            ControlMessage::ActorRefAdvertisement(adv) => {
                let table_version = adv.table.version();
                self.apply_actor_ref_table(adv.table).then(|| {
                    ControlMessage::ActorRefAdvertisementAck(ActorRefCompressionAdvertisementAck {
                        from: self.local.clone(),
                        table_version,
                    })
                })
            }
            ControlMessage::ManifestAdvertisement(adv) => {
                let table_version = adv.table.version();
                self.apply_manifest_table(adv.table).then(|| {
                    ControlMessage::ManifestAdvertisementAck(ManifestCompressionAdvertisementAck {
                        from: self.local.clone(),
                        table_version,
                    })
                })
            }
            ControlMessage::ActorRefAdvertisementAck(_)
            | ControlMessage::ManifestAdvertisementAck(_) => None,
        }
    }
}

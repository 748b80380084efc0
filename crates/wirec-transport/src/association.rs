use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use wirec_core::{Association, ControlMessage, InboundContext, NodeIdentity};

use crate::codec::ControlCodec;

/// One association whose control stream is an mpsc channel of encoded frames.
///
/// Flags are written by the handshake side and read by the decode stage.
pub struct ChannelAssociation {
    remote: NodeIdentity,
    quarantined: AtomicBool,
    stream_active: AtomicBool,
    control_tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelAssociation {
    pub fn new(remote: NodeIdentity, control_tx: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            remote,
            quarantined: AtomicBool::new(false),
            stream_active: AtomicBool::new(true),
            control_tx,
        }
    }

    pub fn quarantine(&self) {
        tracing::warn!("Association to {} quarantined", self.remote);
        self.quarantined.store(true, Ordering::Release);
    }

    pub fn set_stream_active(&self, active: bool) {
        self.stream_active.store(active, Ordering::Release);
    }
}

impl Association for ChannelAssociation {
    fn remote_address(&self) -> &NodeIdentity {
        &self.remote
    }

    fn is_quarantined(&self, origin_id: u64) -> bool {
        origin_id == self.remote.origin_id && self.quarantined.load(Ordering::Acquire)
    }

    fn is_message_stream_active(&self) -> bool {
        self.stream_active.load(Ordering::Acquire)
    }

    fn send_control(&self, message: ControlMessage) {
        let frame = match ControlCodec::encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Dropping control message to {}: {}", self.remote, e);
                return;
            }
        };
        if self.control_tx.send(frame).is_err() {
            tracing::warn!("Control stream to {} is closed", self.remote);
        }
    }
}

/// Associations by remote origin id, plus the local identity.
///
/// Removed origins are remembered as lost until they associate again.
pub struct AssociationTable {
    local: NodeIdentity,
    associations: RwLock<HashMap<u64, Arc<ChannelAssociation>>>,
    lost: RwLock<HashSet<u64>>,
}

impl AssociationTable {
    pub fn new(local: NodeIdentity) -> Arc<Self> {
        Arc::new(Self {
            local,
            associations: RwLock::new(HashMap::new()),
            lost: RwLock::new(HashSet::new()),
        })
    }

    pub fn local(&self) -> &NodeIdentity {
        &self.local
    }

    /// Registers a completed handshake with `remote`.
    pub fn associate(
        &self,
        remote: NodeIdentity,
        control_tx: mpsc::UnboundedSender<Bytes>,
    ) -> Arc<ChannelAssociation> {
        let origin_id = remote.origin_id;
        let association = Arc::new(ChannelAssociation::new(remote, control_tx));
        self.associations.write().insert(origin_id, association.clone());
        self.lost.write().remove(&origin_id);
        tracing::info!("Associated {} -> origin [{}]", self.local, origin_id);
        association
    }

    pub fn get(&self, origin_id: u64) -> Option<Arc<ChannelAssociation>> {
        self.associations.read().get(&origin_id).cloned()
    }

    pub fn remove(&self, origin_id: u64) -> Option<Arc<ChannelAssociation>> {
        let removed = self.associations.write().remove(&origin_id);
        if removed.is_some() {
            self.lost.write().insert(origin_id);
            tracing::info!("Association {} -> origin [{}] removed", self.local, origin_id);
        }
        removed
    }
}

impl InboundContext for AssociationTable {
    type Association = Arc<ChannelAssociation>;

    fn local_address(&self) -> &NodeIdentity {
        &self.local
    }

    fn association(&self, origin_id: u64) -> Option<Arc<ChannelAssociation>> {
        self.get(origin_id)
    }

    fn is_association_lost(&self, origin_id: u64) -> bool {
        self.lost.read().contains(&origin_id)
    }
}

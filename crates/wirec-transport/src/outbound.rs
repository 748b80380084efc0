use std::sync::Arc;

use bytes::Bytes;
use wirec_core::{
    ActorRef, Association, CompressionError, Manifest, NodeIdentity, OutboundCompressions,
    TableVersion,
};

use crate::association::ChannelAssociation;
use crate::codec::ControlCodec;
use crate::envelope::{WireEnvelope, WireField};

/// Sending side of one association: encodes headers with the tables the
/// peer granted us and acknowledges each table it installs.
pub struct OutboundEncoder {
    compressions: OutboundCompressions,
    association: Arc<ChannelAssociation>,
}

impl OutboundEncoder {
    pub fn new(local: NodeIdentity, association: Arc<ChannelAssociation>) -> Self {
        Self {
            compressions: OutboundCompressions::new(local),
            association,
        }
    }

    pub fn compressions(&self) -> &OutboundCompressions {
        &self.compressions
    }

    pub fn encode(
        &self,
        recipient: Option<&ActorRef>,
        manifest: Option<&Manifest>,
        payload: Bytes,
    ) -> WireEnvelope {
        WireEnvelope {
            origin: self.compressions.local().clone(),
            recipient: field(recipient, |v| self.compressions.compress_actor_ref(v)),
            manifest: field(manifest, |v| self.compressions.compress_manifest(v)),
            payload,
        }
    }

    /// Handles one control frame from the peer, replying with an ack when a
    /// table was installed.
    pub fn on_control_frame(&mut self, frame: &[u8]) -> Result<(), CompressionError> {
        let message = ControlCodec::decode(frame)?;
        if let Some(ack) = self.compressions.handle_control(message) {
            self.association.send_control(ack);
        }
        Ok(())
    }
}

fn field<T: Clone>(
    value: Option<&T>,
    compress: impl FnOnce(&T) -> Option<(TableVersion, u32)>,
) -> WireField<T> {
    match value {
        None => WireField::Absent,
        Some(v) => match compress(v) {
            Some((version, code)) => WireField::Compressed { version, code },
            None => WireField::Literal(v.clone()),
        },
    }
}

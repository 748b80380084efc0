//! # wirec: Adaptive Wire Compression
//!
//! Facade over the workspace crates. Peers count the actor refs and
//! manifests they receive, advertise dense code tables for the heaviest
//! ones, and decode the small codes the sender switches to once it has
//! installed a table.
//!
//! ## Crates
//! - `wirec-dsa`: Count-Min sketch and the top-N heavy-hitter tracker.
//! - `wirec-core` (`compression`): code tables, the per-origin advertisement engine, registry, config.
//! - `wirec-transport`: channel-backed associations and the decode stage.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

pub use wirec_core as compression;
pub use wirec_dsa as dsa;
pub use wirec_transport as transport;

pub use wirec_core::{
    ActorRef, CompressionConfig, CompressionError, ControlMessage, Manifest, NodeIdentity,
    TableVersion,
};
pub use wirec_transport::{
    AssociationTable, DecodedEnvelope, InboundCompressionStage, OutboundEncoder, WireEnvelope,
    WireField,
};

/// Channel capacity for inbound and decoded envelopes.
pub const ENVELOPE_BUFFER: usize = 1024;

/// A receiving node: its association table, the decode stage, and the
/// channel ends that feed and drain it.
pub struct InboundNode {
    pub associations: Arc<AssociationTable>,
    pub stage: InboundCompressionStage,
    pub inbound_tx: mpsc::Sender<WireEnvelope>,
    /// Peers write their encoded acks here.
    pub control_tx: mpsc::UnboundedSender<Bytes>,
    pub decoded_rx: mpsc::Receiver<DecodedEnvelope>,
}

/// Wires a decode stage for `local` according to `config`.
pub fn inbound_node(
    local: NodeIdentity,
    config: &CompressionConfig,
) -> Result<InboundNode, CompressionError> {
    let associations = AssociationTable::new(local);
    let compressions = wirec_core::inbound_compressions(associations.clone(), config)?;

    let (inbound_tx, inbound_rx) = mpsc::channel(ENVELOPE_BUFFER);
    let (control_tx, control_rx) = mpsc::unbounded_channel();
    let (decoded_tx, decoded_rx) = mpsc::channel(ENVELOPE_BUFFER);

    tracing::info!(
        "Inbound node {} ready (compression {})",
        associations.local(),
        if config.enabled { "enabled" } else { "disabled" }
    );

    Ok(InboundNode {
        associations,
        stage: InboundCompressionStage::new(compressions, config, inbound_rx, control_rx, decoded_tx),
        inbound_tx,
        control_tx,
        decoded_rx,
    })
}

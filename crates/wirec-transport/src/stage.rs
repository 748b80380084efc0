use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Duration, Instant};
use wirec_core::{CompressionConfig, CompressionError, ControlMessage, InboundCompressions};

use crate::codec::ControlCodec;
use crate::envelope::{DecodedEnvelope, WireEnvelope, WireField};

/// Counters reported when the stage stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub decoded: u64,
    pub dropped: u64,
    pub failed: u64,
    pub acks: u64,
}

/// InboundCompressionStage: the single writer of inbound compression state.
///
/// Decoding, heavy-hitter counting, ack handling and the scheduled
/// advertisement cycles all run on this one task, so the engines need no
/// locking.
pub struct InboundCompressionStage {
    compressions: Box<dyn InboundCompressions + Send>,
    inbound_rx: mpsc::Receiver<WireEnvelope>,
    /// Encoded control frames from peers (acknowledgements).
    control_rx: mpsc::UnboundedReceiver<Bytes>,
    decoded_tx: mpsc::Sender<DecodedEnvelope>,
    actor_ref_interval: Duration,
    manifest_interval: Duration,
    stats: StageStats,
}

impl InboundCompressionStage {
    pub fn new(
        compressions: Box<dyn InboundCompressions + Send>,
        config: &CompressionConfig,
        inbound_rx: mpsc::Receiver<WireEnvelope>,
        control_rx: mpsc::UnboundedReceiver<Bytes>,
        decoded_tx: mpsc::Sender<DecodedEnvelope>,
    ) -> Self {
        Self {
            compressions,
            inbound_rx,
            control_rx,
            decoded_tx,
            actor_ref_interval: Duration::from_millis(
                config.actor_refs.advertisement_interval_ms.max(1),
            ),
            manifest_interval: Duration::from_millis(
                config.manifests.advertisement_interval_ms.max(1),
            ),
            stats: StageStats::default(),
        }
    }

    pub fn stats(&self) -> StageStats {
        self.stats
    }

    pub fn compressions(&self) -> &dyn InboundCompressions {
        self.compressions.as_ref()
    }

    /// Runs until the inbound channel closes.
    pub async fn run(mut self) -> StageStats {
        let start = Instant::now();
        let mut actor_ref_timer = interval_at(start + self.actor_ref_interval, self.actor_ref_interval);
        let mut manifest_timer = interval_at(start + self.manifest_interval, self.manifest_interval);

        tracing::info!(
            "InboundCompressionStage started (actor refs every {:?}, manifests every {:?})",
            self.actor_ref_interval,
            self.manifest_interval
        );

        loop {
            tokio::select! {
                envelope = self.inbound_rx.recv() => match envelope {
                    Some(envelope) => self.on_envelope(envelope).await,
                    None => break,
                },
                Some(frame) = self.control_rx.recv() => {
                    self.on_control_frame(&frame);
                }
                _ = actor_ref_timer.tick() => {
                    self.compressions.prune_unreachable();
                    self.compressions.run_next_actor_ref_advertisement_cycle();
                }
                _ = manifest_timer.tick() => {
                    self.compressions.prune_unreachable();
                    self.compressions.run_next_manifest_advertisement_cycle();
                }
            }
        }

        tracing::info!("InboundCompressionStage stopped: {:?}", self.stats);
        self.stats
    }

    async fn on_envelope(&mut self, envelope: WireEnvelope) {
        let origin = envelope.origin.clone();
        match self.decode(envelope) {
            Ok(Some(decoded)) => {
                self.stats.decoded += 1;
                if self.decoded_tx.send(decoded).await.is_err() {
                    tracing::debug!("Decoded envelope from {} has no consumer", origin);
                }
            }
            Ok(None) => self.stats.dropped += 1,
            Err(e) => {
                self.stats.failed += 1;
                tracing::error!("Dropping message from {}: {}", origin, e);
            }
        }
    }

    /// Resolves every compressed field of `envelope` and counts the values.
    ///
    /// Returns `Ok(None)` when a field refers to a table version this node no
    /// longer (or never) advertised to the sender; the message must be dropped.
    pub fn decode(
        &mut self,
        envelope: WireEnvelope,
    ) -> Result<Option<DecodedEnvelope>, CompressionError> {
        let origin_id = envelope.origin.origin_id;

        let recipient = match envelope.recipient {
            WireField::Absent => None,
            WireField::Literal(value) => Some(value),
            WireField::Compressed { version, code } => {
                match self.compressions.decompress_actor_ref(origin_id, version, code)? {
                    Some(value) => Some(value),
                    None => return Ok(None),
                }
            }
        };
        let manifest = match envelope.manifest {
            WireField::Absent => None,
            WireField::Literal(value) => Some(value),
            WireField::Compressed { version, code } => {
                match self.compressions.decompress_manifest(origin_id, version, code)? {
                    Some(value) => Some(value),
                    None => return Ok(None),
                }
            }
        };

        if let Some(value) = &recipient {
            self.compressions.hit_actor_ref(origin_id, &envelope.origin, value, 1);
        }
        if let Some(value) = &manifest {
            self.compressions.hit_manifest(origin_id, &envelope.origin, value, 1);
        }

        Ok(Some(DecodedEnvelope {
            origin_id,
            recipient,
            manifest,
            payload: envelope.payload,
        }))
    }

    pub fn on_control_frame(&mut self, frame: &[u8]) {
        match ControlCodec::decode(frame) {
            Ok(message) => self.on_control(message),
            Err(e) => tracing::warn!("Discarding malformed control frame: {}", e),
        }
    }

    pub fn on_control(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::ActorRefAdvertisementAck(ack) => {
                self.stats.acks += 1;
                self.compressions
                    .confirm_actor_ref_advertisement(ack.from.origin_id, ack.table_version);
            }
            ControlMessage::ManifestAdvertisementAck(ack) => {
                self.stats.acks += 1;
                self.compressions
                    .confirm_manifest_advertisement(ack.from.origin_id, ack.table_version);
            }
            other => tracing::debug!(
                "Inbound stage ignoring advertisement from {}",
                other.from()
            ),
        }
    }

    /// Runs both advertisement cycles now, as the timers would.
    pub fn tick(&mut self) {
        self.compressions.prune_unreachable();
        self.compressions.run_next_actor_ref_advertisement_cycle();
        self.compressions.run_next_manifest_advertisement_cycle();
    }
}

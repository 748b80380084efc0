//! # wirec-transport: In-Process Collaborators
//!
//! Channel-backed associations, the control-message codec, and the two
//! stages that drive the compression engine: the inbound decode stage (the
//! single writer of all inbound compression state) and the outbound encoder.

pub mod association;
pub mod codec;
pub mod envelope;
pub mod outbound;
pub mod stage;

pub use association::{AssociationTable, ChannelAssociation};
pub use codec::ControlCodec;
pub use envelope::{DecodedEnvelope, WireEnvelope, WireField};
pub use outbound::OutboundEncoder;
pub use stage::{InboundCompressionStage, StageStats};

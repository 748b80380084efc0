use bytes::Bytes;
use wirec_core::{CompressionError, ControlMessage};

/// JSON framing for control messages.
///
/// Decoding re-runs the density check on every table, so a malformed
/// advertisement is rejected here instead of reaching the encoder.
pub struct ControlCodec;

impl ControlCodec {
    pub fn encode(message: &ControlMessage) -> Result<Bytes, CompressionError> {
        serde_json::to_vec(message)
            .map(Bytes::from)
            .map_err(|e| CompressionError::Codec(e.to_string()))
    }

    pub fn decode(frame: &[u8]) -> Result<ControlMessage, CompressionError> {
        serde_json::from_slice(frame).map_err(|e| CompressionError::Codec(e.to_string()))
    }
}

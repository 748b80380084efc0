use thiserror::Error;
use wirec_dsa::DsaError;

use crate::table::TableVersion;

#[derive(Debug, Error)]
pub enum CompressionError {
    /// Codes must be `0..k` with no gaps or duplicates. Always a caller bug.
    #[error("code table for origin {origin_id} v{version} is not dense: {detail}")]
    NonDenseTable {
        origin_id: u64,
        version: TableVersion,
        detail: String,
    },

    /// The table version was known but the code was not in it.
    #[error("unknown compressed id {code} in table v{version} from origin {origin_id}")]
    UnknownCompressedId {
        origin_id: u64,
        version: TableVersion,
        code: u32,
    },

    #[error(transparent)]
    Dsa(#[from] DsaError),

    #[error("invalid compression config: {0}")]
    Config(String),

    #[error("control message codec: {0}")]
    Codec(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

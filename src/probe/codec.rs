//! Probe reply wire format: the pending count as an 8-byte little-endian u64.

use thiserror::Error;

/// Encoded size of a probe reply.
pub const PENDING_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe reply must be {PENDING_LEN} bytes, got {0}")]
    Length(usize),
}

/// Encode a pending count.
pub fn encode_pending(pending: u64) -> [u8; PENDING_LEN] {
    pending.to_le_bytes()
}

/// Decode a pending count.
pub fn decode_pending(payload: &[u8]) -> Result<u64, ProbeError> {
    let bytes: [u8; PENDING_LEN] = payload
        .try_into()
        .map_err(|_| ProbeError::Length(payload.len()))?;
    Ok(u64::from_le_bytes(bytes))
}

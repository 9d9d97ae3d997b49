//! Binary chunk encoding for `data` events and port `write` calls.
//!
//! Chunks travel as lowercase hex strings inside JSON payloads.

/// Encodes a chunk for the wire.
pub fn encode_chunk(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a chunk received from the peer.
pub fn decode_chunk(data: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(data)
}

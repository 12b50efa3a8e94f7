//! Text to bytes conversion for metadata fields.
//!
//! Token metadata is stored as raw bytes on chain, so human readable
//! strings (names, symbols, URLs) go in as their UTF-8 bytes.

use crate::michelson::error::EncodingError;

/// UTF-8 bytes of `text`.
pub fn char_to_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Hex rendering of [`char_to_bytes`].
pub fn char_to_hex(text: &str) -> String {
    hex::encode(text.as_bytes())
}

/// Inverse of [`char_to_bytes`].
pub fn bytes_to_char(bytes: &[u8]) -> Result<String, EncodingError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| EncodingError::literal("bytes", format!("not utf-8 text: {e}")))
}

//! Base58Check encoding with Tezos type prefixes.

use thiserror::Error;

/// A base58check type prefix and the payload length it wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    /// Human readable start of the encoded string.
    pub name: &'static str,
    /// Raw bytes prepended to the payload before checksumming.
    pub bytes: &'static [u8],
    /// Expected payload length in bytes.
    pub payload_len: usize,
}

pub const TZ1: Prefix = Prefix { name: "tz1", bytes: &[6, 161, 159], payload_len: 20 };
pub const TZ2: Prefix = Prefix { name: "tz2", bytes: &[6, 161, 161], payload_len: 20 };
pub const TZ3: Prefix = Prefix { name: "tz3", bytes: &[6, 161, 164], payload_len: 20 };
pub const KT1: Prefix = Prefix { name: "KT1", bytes: &[2, 90, 121], payload_len: 20 };

pub const EDPK: Prefix = Prefix { name: "edpk", bytes: &[13, 15, 37, 217], payload_len: 32 };
pub const SPPK: Prefix = Prefix { name: "sppk", bytes: &[3, 254, 226, 86], payload_len: 33 };
pub const P2PK: Prefix = Prefix { name: "p2pk", bytes: &[3, 178, 139, 127], payload_len: 33 };

/// Ed25519 seed (32 bytes).
pub const EDSK_SEED: Prefix = Prefix { name: "edsk", bytes: &[13, 15, 58, 7], payload_len: 32 };
/// Ed25519 expanded secret key (seed followed by public key).
pub const EDSK: Prefix = Prefix { name: "edsk", bytes: &[43, 246, 78, 7], payload_len: 64 };

pub const EDSIG: Prefix = Prefix { name: "edsig", bytes: &[9, 245, 205, 134, 18], payload_len: 64 };
pub const SPSIG: Prefix = Prefix { name: "spsig1", bytes: &[13, 115, 101, 19, 63], payload_len: 64 };
pub const P2SIG: Prefix = Prefix { name: "p2sig", bytes: &[54, 240, 44, 52], payload_len: 64 };
pub const SIG: Prefix = Prefix { name: "sig", bytes: &[4, 130, 43], payload_len: 64 };

pub const OPERATION: Prefix = Prefix { name: "o", bytes: &[5, 116], payload_len: 32 };
pub const BLOCK: Prefix = Prefix { name: "B", bytes: &[1, 52], payload_len: 32 };
pub const CHAIN_ID: Prefix = Prefix { name: "Net", bytes: &[87, 82, 0], payload_len: 4 };

/// Errors raised while decoding base58check strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base58Error {
    /// Not base58, or checksum mismatch.
    #[error("invalid base58check string '{0}'")]
    Invalid(String),

    /// Valid base58check but none of the accepted prefixes matched.
    #[error("'{value}' is not a valid {expected}")]
    WrongPrefix { value: String, expected: String },
}

/// Encode `payload` under `prefix`.
pub fn encode(prefix: &Prefix, payload: &[u8]) -> String {
    let mut raw = Vec::with_capacity(prefix.bytes.len() + payload.len());
    raw.extend_from_slice(prefix.bytes);
    raw.extend_from_slice(payload);
    bs58::encode(raw).with_check().into_string()
}

/// Decode `value`, requiring it to carry `prefix`.
pub fn decode(prefix: &Prefix, value: &str) -> Result<Vec<u8>, Base58Error> {
    decode_any(value, &[prefix]).map(|(_, payload)| payload)
}

/// Decode `value` against a set of accepted prefixes.
///
/// Returns the matching prefix and the payload with prefix and checksum
/// stripped.
pub fn decode_any<'a>(
    value: &str,
    prefixes: &[&'a Prefix],
) -> Result<(&'a Prefix, Vec<u8>), Base58Error> {
    let raw = bs58::decode(value)
        .with_check(None)
        .into_vec()
        .map_err(|_| Base58Error::Invalid(value.to_string()))?;

    for prefix in prefixes {
        if raw.starts_with(prefix.bytes) && raw.len() == prefix.bytes.len() + prefix.payload_len {
            return Ok((prefix, raw[prefix.bytes.len()..].to_vec()));
        }
    }

    Err(Base58Error::WrongPrefix {
        value: value.to_string(),
        expected: prefixes.iter().map(|p| p.name).collect::<Vec<_>>().join(" or "),
    })
}

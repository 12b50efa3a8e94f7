//! `PACK` / `UNPACK`: the canonical byte form of typed data.

use crate::michelson::binary;
use crate::michelson::error::EncodingError;
use crate::michelson::types::Type;
use crate::michelson::value::Value;

/// Leading byte of packed data.
pub const PACK_TAG: u8 = 0x05;

/// Serialize `value` under `ty` the way the Michelson `PACK` instruction does.
pub fn pack(ty: &Type, value: &Value) -> Result<Vec<u8>, EncodingError> {
    let node = value.to_micheline(ty)?;
    let mut out = vec![PACK_TAG];
    binary::encode(&node, &mut out)?;
    Ok(out)
}

/// Inverse of [`pack`].
pub fn unpack(ty: &Type, bytes: &[u8]) -> Result<Value, EncodingError> {
    match bytes.split_first() {
        Some((&PACK_TAG, body)) => {
            let node = binary::decode(body).map_err(|e| match e {
                EncodingError::Decode { offset, reason } => EncodingError::Decode { offset: offset + 1, reason },
                other => other,
            })?;
            Value::from_micheline(ty, &node)
        }
        _ => Err(EncodingError::Decode { offset: 0, reason: "missing 0x05 pack tag".into() }),
    }
}

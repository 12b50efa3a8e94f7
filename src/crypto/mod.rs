//! Tezos cryptographic primitives.
//!
//! # Data Flow
//! ```text
//! base58check strings (tz1…, KT1…, edpk…, edsig…, o…)
//!     → base58.rs (prefix table, checksum)
//!     → keys.rs (Address, PublicKey, KeyHash, Signature)
//!     → binary forms consumed by the michelson encoder
//!
//! hash.rs: blake2b digests for key hashes, signing and operation hashes
//! ```

pub mod base58;
pub mod hash;
pub mod keys;

pub use base58::{Base58Error, Prefix};
pub use keys::{Account, Address, KeyError, KeyHash, PublicKey, Signature};

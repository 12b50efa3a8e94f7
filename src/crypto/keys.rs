//! Addresses, public keys, key hashes and signatures.
//!
//! Each type parses from and displays as its base58check form and converts
//! to the binary layout Michelson uses for its optimized representation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::crypto::base58::{self, Base58Error, Prefix};
use crate::crypto::hash::blake2b_160;

/// Longest entrypoint name accepted by the protocol.
pub const MAX_ENTRYPOINT_LEN: usize = 31;

/// Errors raised while parsing keys and addresses.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error(transparent)]
    Base58(#[from] Base58Error),

    #[error("invalid binary {kind}: {reason}")]
    InvalidBytes { kind: &'static str, reason: String },

    #[error("invalid entrypoint '{0}'")]
    InvalidEntrypoint(String),
}

fn invalid(kind: &'static str, reason: impl Into<String>) -> KeyError {
    KeyError::InvalidBytes { kind, reason: reason.into() }
}

/// Hash of a public key, identifying an implicit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyHash {
    Ed25519([u8; 20]),
    Secp256k1([u8; 20]),
    P256([u8; 20]),
}

impl KeyHash {
    fn prefix(&self) -> &'static Prefix {
        match self {
            KeyHash::Ed25519(_) => &base58::TZ1,
            KeyHash::Secp256k1(_) => &base58::TZ2,
            KeyHash::P256(_) => &base58::TZ3,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            KeyHash::Ed25519(_) => 0,
            KeyHash::Secp256k1(_) => 1,
            KeyHash::P256(_) => 2,
        }
    }

    /// The 20-byte digest.
    pub fn digest(&self) -> &[u8; 20] {
        match self {
            KeyHash::Ed25519(h) | KeyHash::Secp256k1(h) | KeyHash::P256(h) => h,
        }
    }

    /// Tagged binary form (21 bytes).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(21);
        out.push(self.tag());
        out.extend_from_slice(self.digest());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 21 {
            return Err(invalid("key_hash", format!("expected 21 bytes, got {}", bytes.len())));
        }
        let mut digest = [0u8; 20];
        digest.copy_from_slice(&bytes[1..]);
        match bytes[0] {
            0 => Ok(KeyHash::Ed25519(digest)),
            1 => Ok(KeyHash::Secp256k1(digest)),
            2 => Ok(KeyHash::P256(digest)),
            tag => Err(invalid("key_hash", format!("unknown tag {tag}"))),
        }
    }
}

impl FromStr for KeyHash {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, payload) =
            base58::decode_any(s, &[&base58::TZ1, &base58::TZ2, &base58::TZ3])?;
        let mut digest = [0u8; 20];
        digest.copy_from_slice(&payload);
        Ok(match prefix.name {
            "tz1" => KeyHash::Ed25519(digest),
            "tz2" => KeyHash::Secp256k1(digest),
            _ => KeyHash::P256(digest),
        })
    }
}

impl fmt::Display for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58::encode(self.prefix(), self.digest()))
    }
}

/// The account an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Account {
    Implicit(KeyHash),
    Originated([u8; 20]),
}

/// A Michelson address: an account plus an optional entrypoint suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    account: Account,
    entrypoint: Option<String>,
}

impl Address {
    pub fn implicit(hash: KeyHash) -> Self {
        Self { account: Account::Implicit(hash), entrypoint: None }
    }

    pub fn originated(hash: [u8; 20]) -> Self {
        Self { account: Account::Originated(hash), entrypoint: None }
    }

    /// Attach an entrypoint suffix (`KT1…%name`).
    pub fn with_entrypoint(mut self, entrypoint: &str) -> Result<Self, KeyError> {
        validate_entrypoint(entrypoint)?;
        self.entrypoint = Some(entrypoint.to_string());
        Ok(self)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn is_originated(&self) -> bool {
        matches!(self.account, Account::Originated(_))
    }

    /// The address without its entrypoint suffix.
    pub fn without_entrypoint(&self) -> Self {
        Self { account: self.account, entrypoint: None }
    }

    /// Binary form: 22 bytes of account followed by the entrypoint name.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(22);
        match &self.account {
            Account::Implicit(hash) => {
                out.push(0);
                out.extend_from_slice(&hash.to_bytes());
            }
            Account::Originated(hash) => {
                out.push(1);
                out.extend_from_slice(hash);
                out.push(0);
            }
        }
        if let Some(entrypoint) = &self.entrypoint {
            out.extend_from_slice(entrypoint.as_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() < 22 {
            return Err(invalid("address", format!("expected at least 22 bytes, got {}", bytes.len())));
        }
        let account = match bytes[0] {
            0 => Account::Implicit(KeyHash::from_bytes(&bytes[1..22])?),
            1 => {
                if bytes[21] != 0 {
                    return Err(invalid("address", "originated address padding must be zero"));
                }
                let mut hash = [0u8; 20];
                hash.copy_from_slice(&bytes[1..21]);
                Account::Originated(hash)
            }
            tag => return Err(invalid("address", format!("unknown tag {tag}"))),
        };
        let entrypoint = if bytes.len() > 22 {
            let name = std::str::from_utf8(&bytes[22..])
                .map_err(|_| invalid("address", "entrypoint is not utf-8"))?;
            validate_entrypoint(name)?;
            Some(name.to_string())
        } else {
            None
        };
        Ok(Self { account, entrypoint })
    }
}

fn validate_entrypoint(name: &str) -> Result<(), KeyError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_ENTRYPOINT_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '%' || c == '@');
    if valid {
        Ok(())
    } else {
        Err(KeyError::InvalidEntrypoint(name.to_string()))
    }
}

impl FromStr for Address {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, entrypoint) = match s.split_once('%') {
            Some((base, ep)) => (base, Some(ep)),
            None => (s, None),
        };
        let address = if base.starts_with("KT1") {
            let payload = base58::decode(&base58::KT1, base)?;
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&payload);
            Address::originated(hash)
        } else {
            Address::implicit(base.parse()?)
        };
        match entrypoint {
            Some(ep) => address.with_entrypoint(ep),
            None => Ok(address),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.account {
            Account::Implicit(hash) => write!(f, "{hash}")?,
            Account::Originated(hash) => f.write_str(&base58::encode(&base58::KT1, hash))?,
        }
        if let Some(ep) = &self.entrypoint {
            write!(f, "%{ep}")?;
        }
        Ok(())
    }
}

// Michelson orders addresses by their binary form: implicit accounts first.
impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

/// A public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PublicKey {
    Ed25519([u8; 32]),
    Secp256k1([u8; 33]),
    P256([u8; 33]),
}

impl PublicKey {
    fn raw(&self) -> &[u8] {
        match self {
            PublicKey::Ed25519(k) => k,
            PublicKey::Secp256k1(k) | PublicKey::P256(k) => k,
        }
    }

    /// Hash of the key, i.e. the implicit account it controls.
    pub fn hash(&self) -> KeyHash {
        let digest = blake2b_160(self.raw());
        match self {
            PublicKey::Ed25519(_) => KeyHash::Ed25519(digest),
            PublicKey::Secp256k1(_) => KeyHash::Secp256k1(digest),
            PublicKey::P256(_) => KeyHash::P256(digest),
        }
    }

    /// Tagged binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tag = match self {
            PublicKey::Ed25519(_) => 0,
            PublicKey::Secp256k1(_) => 1,
            PublicKey::P256(_) => 2,
        };
        let mut out = vec![tag];
        out.extend_from_slice(self.raw());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let (tag, raw) = bytes
            .split_first()
            .ok_or_else(|| invalid("key", "empty"))?;
        match (*tag, raw.len()) {
            (0, 32) => {
                let mut k = [0u8; 32];
                k.copy_from_slice(raw);
                Ok(PublicKey::Ed25519(k))
            }
            (1 | 2, 33) => {
                let mut k = [0u8; 33];
                k.copy_from_slice(raw);
                Ok(if *tag == 1 { PublicKey::Secp256k1(k) } else { PublicKey::P256(k) })
            }
            (tag, len) => Err(invalid("key", format!("tag {tag} with {len} key bytes"))),
        }
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, payload) =
            base58::decode_any(s, &[&base58::EDPK, &base58::SPPK, &base58::P2PK])?;
        let tag = match prefix.name {
            "edpk" => 0,
            "sppk" => 1,
            _ => 2,
        };
        let mut bytes = vec![tag];
        bytes.extend_from_slice(&payload);
        PublicKey::from_bytes(&bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            PublicKey::Ed25519(_) => &base58::EDPK,
            PublicKey::Secp256k1(_) => &base58::SPPK,
            PublicKey::P256(_) => &base58::P2PK,
        };
        f.write_str(&base58::encode(prefix, self.raw()))
    }
}

/// A 64-byte signature.
///
/// The binary form does not carry the curve, so the value displays in the
/// generic `sig…` encoding; [`Signature::to_ed25519_string`] gives `edsig…`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let sig: [u8; 64] = bytes
            .try_into()
            .map_err(|_| invalid("signature", format!("expected 64 bytes, got {}", bytes.len())))?;
        Ok(Signature(sig))
    }

    pub fn to_ed25519_string(&self) -> String {
        base58::encode(&base58::EDSIG, &self.0)
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, payload) = base58::decode_any(
            s,
            &[&base58::EDSIG, &base58::SPSIG, &base58::P2SIG, &base58::SIG],
        )?;
        Signature::from_bytes(&payload)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base58::encode(&base58::SIG, &self.0))
    }
}

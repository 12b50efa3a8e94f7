//! Typed Michelson values.
//!
//! A [`Value`] is checked against a [`Type`] on the way to Micheline
//! ([`Value::to_micheline`], optimized form, ready for packing) and on the
//! way back ([`Value::from_micheline`], accepting optimized and readable
//! forms).

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use num_bigint::{BigInt, BigUint};

use crate::crypto::{base58, Address, KeyError, KeyHash, PublicKey, Signature};
use crate::michelson::error::EncodingError;
use crate::michelson::micheline::Micheline;
use crate::michelson::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(BigInt),
    Nat(BigUint),
    Mutez(u64),
    String(String),
    Bytes(Vec<u8>),
    /// Seconds since the Unix epoch.
    Timestamp(i64),
    Address(Address),
    Key(PublicKey),
    KeyHash(KeyHash),
    Signature(Signature),
    ChainId([u8; 4]),
    Pair(Box<Value>, Box<Value>),
    Left(Box<Value>),
    Right(Box<Value>),
    Option(Option<Box<Value>>),
    /// Elements of a `list` or a `set`.
    List(Vec<Value>),
    /// Entries of a `map` or a `big_map` literal.
    Map(Vec<(Value, Value)>),
    /// Code of a `lambda`, a Micheline instruction sequence.
    Lambda(Micheline),
}

impl Value {
    pub fn nat(value: u64) -> Self {
        Value::Nat(BigUint::from(value))
    }

    pub fn int(value: i64) -> Self {
        Value::Int(BigInt::from(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(value.into())
    }

    pub fn pair(left: Value, right: Value) -> Self {
        Value::Pair(Box::new(left), Box::new(right))
    }

    pub fn some(inner: Value) -> Self {
        Value::Option(Some(Box::new(inner)))
    }

    /// Right comb of pairs, matching [`Type::comb`].
    pub fn comb(mut items: Vec<Value>) -> Result<Self, EncodingError> {
        let mut acc = items
            .pop()
            .ok_or_else(|| EncodingError::literal("pair", "needs at least two components"))?;
        if items.is_empty() {
            return Err(EncodingError::literal("pair", "needs at least two components"));
        }
        while let Some(item) = items.pop() {
            acc = Value::pair(item, acc);
        }
        Ok(acc)
    }

    /// Parse a decimal natural number.
    pub fn parse_nat(text: &str) -> Result<Self, EncodingError> {
        text.parse::<BigUint>()
            .map(Value::Nat)
            .map_err(|_| EncodingError::literal("nat", format!("'{text}' is not a natural number")))
    }

    /// Parse an RFC 3339 timestamp (`2023-10-05T16:27:56Z`).
    pub fn parse_timestamp(text: &str) -> Result<Self, EncodingError> {
        DateTime::parse_from_rfc3339(text)
            .map(|t| Value::Timestamp(t.timestamp()))
            .map_err(|e| EncodingError::literal("timestamp", format!("'{text}': {e}")))
    }

    /// RFC 3339 rendering of a timestamp value.
    pub fn timestamp_to_rfc3339(seconds: i64) -> Option<String> {
        DateTime::<Utc>::from_timestamp(seconds, 0).map(|t| t.to_rfc3339())
    }

    /// Build a record value from named fields following the schema layout.
    ///
    /// Every annotated leaf of `ty` must be supplied exactly once; extra
    /// fields are rejected.
    pub fn record<I, S>(ty: &Type, fields: I) -> Result<Self, EncodingError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut fields: BTreeMap<String, Value> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();

        // An entrypoint type may carry its own name as an outer annotation.
        let ty = match ty {
            Type::Field(name, inner) if !fields.contains_key(name) => inner.as_ref(),
            other => other,
        };

        let value = build_record(ty, &mut fields)?;
        match fields.into_keys().next() {
            Some(extra) => Err(EncodingError::UnknownField(extra)),
            None => Ok(value),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Nat(_) => "nat",
            Value::Mutez(_) => "mutez",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Address(_) => "address",
            Value::Key(_) => "key",
            Value::KeyHash(_) => "key_hash",
            Value::Signature(_) => "signature",
            Value::ChainId(_) => "chain_id",
            Value::Pair(_, _) => "pair",
            Value::Left(_) | Value::Right(_) => "or",
            Value::Option(_) => "option",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Lambda(_) => "lambda",
        }
    }

    /// Optimized Micheline for this value under `ty`.
    pub fn to_micheline(&self, ty: &Type) -> Result<Micheline, EncodingError> {
        let mismatch = || EncodingError::TypeMismatch {
            expected: ty.to_string(),
            found: self.kind().to_string(),
        };

        let node = match (ty.strip(), self) {
            (Type::Unit, Value::Unit) => Micheline::prim("Unit", vec![]),
            (Type::Bool, Value::Bool(b)) => Micheline::prim(if *b { "True" } else { "False" }, vec![]),
            (Type::Int, Value::Int(i)) => Micheline::Int { int: i.clone() },
            (Type::Nat, Value::Nat(n)) => Micheline::Int { int: BigInt::from(n.clone()) },
            (Type::Mutez, Value::Mutez(m)) => {
                if *m > i64::MAX as u64 {
                    return Err(EncodingError::literal("mutez", format!("{m} overflows int64")));
                }
                Micheline::int(*m)
            }
            (Type::String, Value::String(s)) => {
                check_printable(s)?;
                Micheline::string(s.clone())
            }
            (Type::Bytes, Value::Bytes(b)) => Micheline::bytes(b.clone()),
            (Type::Timestamp, Value::Timestamp(t)) => Micheline::int(*t),
            (Type::Address | Type::Contract(_), Value::Address(a)) => Micheline::bytes(a.to_bytes()),
            (Type::Key, Value::Key(k)) => Micheline::bytes(k.to_bytes()),
            (Type::KeyHash, Value::KeyHash(h)) => Micheline::bytes(h.to_bytes()),
            (Type::Signature, Value::Signature(s)) => Micheline::bytes(s.as_bytes().to_vec()),
            (Type::ChainId, Value::ChainId(c)) => Micheline::bytes(c.to_vec()),
            (Type::Pair(a, b), Value::Pair(x, y)) => {
                Micheline::prim("Pair", vec![x.to_micheline(a)?, y.to_micheline(b)?])
            }
            (Type::Or(a, _), Value::Left(x)) => Micheline::prim("Left", vec![x.to_micheline(a)?]),
            (Type::Or(_, b), Value::Right(x)) => Micheline::prim("Right", vec![x.to_micheline(b)?]),
            (Type::Option(a), Value::Option(Some(x))) => Micheline::prim("Some", vec![x.to_micheline(a)?]),
            (Type::Option(_), Value::Option(None)) => Micheline::prim("None", vec![]),
            (Type::List(a), Value::List(items)) => Micheline::seq(
                items.iter().map(|v| v.to_micheline(a)).collect::<Result<_, _>>()?,
            ),
            (Type::Set(a), Value::List(items)) => {
                check_increasing(items.iter(), "set")?;
                Micheline::seq(items.iter().map(|v| v.to_micheline(a)).collect::<Result<_, _>>()?)
            }
            (Type::Map(k, v) | Type::BigMap(k, v), Value::Map(entries)) => {
                check_increasing(entries.iter().map(|(key, _)| key), "map")?;
                let mut elts = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    elts.push(Micheline::prim("Elt", vec![key.to_micheline(k)?, value.to_micheline(v)?]));
                }
                Micheline::seq(elts)
            }
            (Type::Lambda(_, _), Value::Lambda(code)) => {
                if !matches!(code, Micheline::Seq(_)) {
                    return Err(EncodingError::literal("lambda", "code must be an instruction sequence"));
                }
                code.clone()
            }
            _ => return Err(mismatch()),
        };
        Ok(node)
    }

    /// Check a Micheline node against `ty` and lift it into a value.
    pub fn from_micheline(ty: &Type, node: &Micheline) -> Result<Self, EncodingError> {
        let mismatch = || EncodingError::TypeMismatch {
            expected: ty.to_string(),
            found: node.describe(),
        };

        let value = match (ty.strip(), node) {
            (Type::Unit, Micheline::Prim { prim, args, .. }) if prim == "Unit" && args.is_empty() => {
                Value::Unit
            }
            (Type::Bool, Micheline::Prim { prim, args, .. }) if args.is_empty() => match prim.as_str() {
                "True" => Value::Bool(true),
                "False" => Value::Bool(false),
                _ => return Err(mismatch()),
            },
            (Type::Int, Micheline::Int { int }) => Value::Int(int.clone()),
            (Type::Nat, Micheline::Int { int }) => Value::Nat(
                int.to_biguint()
                    .ok_or_else(|| EncodingError::literal("nat", format!("{int} is negative")))?,
            ),
            (Type::Mutez, Micheline::Int { int }) => {
                let amount = u64::try_from(int)
                    .ok()
                    .filter(|m| *m <= i64::MAX as u64)
                    .ok_or_else(|| EncodingError::literal("mutez", format!("{int} is out of range")))?;
                Value::Mutez(amount)
            }
            (Type::String, Micheline::String { string }) => {
                check_printable(string)?;
                Value::String(string.clone())
            }
            (Type::Bytes, Micheline::Bytes { bytes }) => Value::Bytes(bytes.clone()),
            (Type::Timestamp, Micheline::Int { int }) => Value::Timestamp(
                i64::try_from(int)
                    .map_err(|_| EncodingError::literal("timestamp", format!("{int} is out of range")))?,
            ),
            (Type::Timestamp, Micheline::String { string }) => Value::parse_timestamp(string)?,
            (Type::Address | Type::Contract(_), Micheline::Bytes { bytes }) => {
                Value::Address(Address::from_bytes(bytes)?)
            }
            (Type::Address | Type::Contract(_), Micheline::String { string }) => {
                Value::Address(string.parse()?)
            }
            (Type::Key, Micheline::Bytes { bytes }) => Value::Key(PublicKey::from_bytes(bytes)?),
            (Type::Key, Micheline::String { string }) => Value::Key(string.parse()?),
            (Type::KeyHash, Micheline::Bytes { bytes }) => Value::KeyHash(KeyHash::from_bytes(bytes)?),
            (Type::KeyHash, Micheline::String { string }) => Value::KeyHash(string.parse()?),
            (Type::Signature, Micheline::Bytes { bytes }) => Value::Signature(Signature::from_bytes(bytes)?),
            (Type::Signature, Micheline::String { string }) => Value::Signature(string.parse()?),
            (Type::ChainId, Micheline::Bytes { bytes }) => Value::ChainId(chain_id(bytes)?),
            (Type::ChainId, Micheline::String { string }) => {
                let raw = base58::decode(&base58::CHAIN_ID, string).map_err(KeyError::from)?;
                Value::ChainId(chain_id(&raw)?)
            }
            (Type::Pair(a, b), Micheline::Prim { prim, args, .. }) if prim == "Pair" && args.len() >= 2 => {
                let left = Value::from_micheline(a, &args[0])?;
                let rest = if args.len() == 2 {
                    args[1].clone()
                } else {
                    Micheline::prim("Pair", args[1..].to_vec())
                };
                Value::pair(left, Value::from_micheline(b, &rest)?)
            }
            (Type::Pair(a, b), Micheline::Seq(items)) if items.len() >= 2 => {
                let left = Value::from_micheline(a, &items[0])?;
                let rest = if items.len() == 2 {
                    items[1].clone()
                } else {
                    Micheline::seq(items[1..].to_vec())
                };
                Value::pair(left, Value::from_micheline(b, &rest)?)
            }
            (Type::Or(a, b), Micheline::Prim { prim, args, .. }) if args.len() == 1 => match prim.as_str() {
                "Left" => Value::Left(Box::new(Value::from_micheline(a, &args[0])?)),
                "Right" => Value::Right(Box::new(Value::from_micheline(b, &args[0])?)),
                _ => return Err(mismatch()),
            },
            (Type::Option(a), Micheline::Prim { prim, args, .. }) => match (prim.as_str(), args.len()) {
                ("Some", 1) => Value::some(Value::from_micheline(a, &args[0])?),
                ("None", 0) => Value::Option(None),
                _ => return Err(mismatch()),
            },
            (Type::List(a), Micheline::Seq(items)) => Value::List(
                items.iter().map(|n| Value::from_micheline(a, n)).collect::<Result<_, _>>()?,
            ),
            (Type::Set(a), Micheline::Seq(items)) => {
                let items: Vec<Value> =
                    items.iter().map(|n| Value::from_micheline(a, n)).collect::<Result<_, _>>()?;
                check_increasing(items.iter(), "set")?;
                Value::List(items)
            }
            (Type::Map(k, v) | Type::BigMap(k, v), Micheline::Seq(items)) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Micheline::Prim { prim, args, .. } if prim == "Elt" && args.len() == 2 => {
                            entries.push((Value::from_micheline(k, &args[0])?, Value::from_micheline(v, &args[1])?));
                        }
                        other => {
                            return Err(EncodingError::TypeMismatch {
                                expected: "Elt".into(),
                                found: other.describe(),
                            })
                        }
                    }
                }
                check_increasing(entries.iter().map(|(key, _)| key), "map")?;
                Value::Map(entries)
            }
            (Type::Lambda(_, _), Micheline::Seq(_)) => Value::Lambda(node.clone()),
            _ => return Err(mismatch()),
        };
        Ok(value)
    }
}

fn build_record(ty: &Type, fields: &mut BTreeMap<String, Value>) -> Result<Value, EncodingError> {
    match ty {
        Type::Field(name, _) => fields
            .remove(name)
            .ok_or_else(|| EncodingError::MissingField(name.clone())),
        Type::Pair(a, b) => Ok(Value::pair(build_record(a, fields)?, build_record(b, fields)?)),
        other => Err(EncodingError::InvalidSchema(format!(
            "record component of type {other} has no field annotation"
        ))),
    }
}

fn chain_id(bytes: &[u8]) -> Result<[u8; 4], EncodingError> {
    bytes
        .try_into()
        .map_err(|_| EncodingError::literal("chain_id", format!("expected 4 bytes, got {}", bytes.len())))
}

/// Michelson strings hold printable ASCII and newlines only.
fn check_printable(s: &str) -> Result<(), EncodingError> {
    match s.chars().find(|c| !(c.is_ascii_graphic() || *c == ' ' || *c == '\n')) {
        Some(c) => Err(EncodingError::literal(
            "string",
            format!("character {c:?} is not printable ASCII; encode text as bytes instead"),
        )),
        None => Ok(()),
    }
}

fn check_increasing<'a>(
    mut keys: impl Iterator<Item = &'a Value>,
    what: &'static str,
) -> Result<(), EncodingError> {
    let Some(mut previous) = keys.next() else { return Ok(()) };
    if compare(previous, previous).is_none() {
        return Err(EncodingError::NotComparable(previous.kind().to_string()));
    }
    for key in keys {
        match compare(previous, key) {
            Some(Ordering::Less) => previous = key,
            Some(_) => return Err(EncodingError::UnsortedKeys(what)),
            None => return Err(EncodingError::NotComparable(key.kind().to_string())),
        }
    }
    Ok(())
}

/// Michelson `COMPARE` on comparable values; `None` when incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Unit, Value::Unit) => Some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Nat(x), Value::Nat(y)) => Some(x.cmp(y)),
        (Value::Mutez(x), Value::Mutez(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.as_bytes().cmp(y.as_bytes())),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Address(x), Value::Address(y)) => Some(x.cmp(y)),
        (Value::Key(x), Value::Key(y)) => Some(x.cmp(y)),
        (Value::KeyHash(x), Value::KeyHash(y)) => Some(x.cmp(y)),
        (Value::Signature(x), Value::Signature(y)) => Some(x.cmp(y)),
        (Value::ChainId(x), Value::ChainId(y)) => Some(x.cmp(y)),
        (Value::Pair(a1, b1), Value::Pair(a2, b2)) => match compare(a1, a2)? {
            Ordering::Equal => compare(b1, b2),
            other => Some(other),
        },
        (Value::Option(None), Value::Option(None)) => Some(Ordering::Equal),
        (Value::Option(None), Value::Option(Some(_))) => Some(Ordering::Less),
        (Value::Option(Some(_)), Value::Option(None)) => Some(Ordering::Greater),
        (Value::Option(Some(x)), Value::Option(Some(y))) => compare(x, y),
        (Value::Left(x), Value::Left(y)) | (Value::Right(x), Value::Right(y)) => compare(x, y),
        (Value::Left(_), Value::Right(_)) => Some(Ordering::Less),
        (Value::Right(_), Value::Left(_)) => Some(Ordering::Greater),
        _ => None,
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Address(address)
    }
}

impl From<PublicKey> for Value {
    fn from(key: PublicKey) -> Self {
        Value::Key(key)
    }
}

impl From<Signature> for Value {
    fn from(signature: Signature) -> Self {
        Value::Signature(signature)
    }
}

impl From<BigUint> for Value {
    fn from(n: BigUint) -> Self {
        Value::Nat(n)
    }
}

impl From<BigInt> for Value {
    fn from(n: BigInt) -> Self {
        Value::Int(n)
    }
}

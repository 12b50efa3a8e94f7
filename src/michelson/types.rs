//! Michelson type expressions.

use std::fmt;

use crate::michelson::error::EncodingError;
use crate::michelson::micheline::Micheline;

/// A Michelson type.
///
/// `Field` carries a `%name` annotation; it is transparent for type
/// checking and is used to address record leaves by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Unit,
    Bool,
    Int,
    Nat,
    Mutez,
    String,
    Bytes,
    Timestamp,
    Address,
    Key,
    KeyHash,
    Signature,
    ChainId,
    Operation,
    Option(Box<Type>),
    List(Box<Type>),
    Set(Box<Type>),
    Contract(Box<Type>),
    Map(Box<Type>, Box<Type>),
    BigMap(Box<Type>, Box<Type>),
    Pair(Box<Type>, Box<Type>),
    Or(Box<Type>, Box<Type>),
    Lambda(Box<Type>, Box<Type>),
    Field(String, Box<Type>),
}

impl Type {
    pub fn pair(left: Type, right: Type) -> Self {
        Type::Pair(Box::new(left), Box::new(right))
    }

    pub fn or(left: Type, right: Type) -> Self {
        Type::Or(Box::new(left), Box::new(right))
    }

    pub fn option(inner: Type) -> Self {
        Type::Option(Box::new(inner))
    }

    pub fn list(inner: Type) -> Self {
        Type::List(Box::new(inner))
    }

    pub fn set(inner: Type) -> Self {
        Type::Set(Box::new(inner))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn big_map(key: Type, value: Type) -> Self {
        Type::BigMap(Box::new(key), Box::new(value))
    }

    pub fn lambda(arg: Type, ret: Type) -> Self {
        Type::Lambda(Box::new(arg), Box::new(ret))
    }

    /// Annotate with a field name.
    pub fn field(name: &str, inner: Type) -> Self {
        Type::Field(name.to_string(), Box::new(inner))
    }

    /// Right comb of pairs: `comb([a, b, c])` is `pair a (pair b c)`.
    pub fn comb(mut items: Vec<Type>) -> Result<Self, EncodingError> {
        if items.len() < 2 {
            return Err(EncodingError::InvalidSchema("pair needs at least two components".into()));
        }
        let mut acc = items.pop().ok_or_else(|| EncodingError::InvalidSchema("empty pair".into()))?;
        while let Some(item) = items.pop() {
            acc = Type::pair(item, acc);
        }
        Ok(acc)
    }

    /// The type with field annotations removed from the top.
    pub fn strip(&self) -> &Type {
        match self {
            Type::Field(_, inner) => inner.strip(),
            other => other,
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            Type::Field(name, _) => Some(name),
            _ => None,
        }
    }

    /// Structural equality ignoring annotations.
    pub fn matches(&self, other: &Type) -> bool {
        use Type::*;
        match (self.strip(), other.strip()) {
            (Option(a), Option(b)) | (List(a), List(b)) | (Set(a), Set(b)) | (Contract(a), Contract(b)) => {
                a.matches(b)
            }
            (Map(k1, v1), Map(k2, v2))
            | (BigMap(k1, v1), BigMap(k2, v2))
            | (Pair(k1, v1), Pair(k2, v2))
            | (Or(k1, v1), Or(k2, v2))
            | (Lambda(k1, v1), Lambda(k2, v2)) => k1.matches(k2) && v1.matches(v2),
            (a, b) => a == b,
        }
    }

    pub fn is_comparable(&self) -> bool {
        use Type::*;
        match self.strip() {
            Unit | Bool | Int | Nat | Mutez | String | Bytes | Timestamp | Address | Key | KeyHash
            | Signature | ChainId => true,
            Option(inner) => inner.is_comparable(),
            Pair(a, b) | Or(a, b) => a.is_comparable() && b.is_comparable(),
            _ => false,
        }
    }

    /// Named leaves of a record type, in layout order.
    ///
    /// Pairs without a field annotation are flattened; an annotated node is
    /// a leaf even when it is itself a pair.
    pub fn fields(&self) -> Vec<(&str, &Type)> {
        let mut out = Vec::new();
        collect_fields(self, &mut out);
        out
    }

    /// Parse a type expression.
    pub fn from_micheline(node: &Micheline) -> Result<Self, EncodingError> {
        let (prim, args, annots) = match node {
            Micheline::Prim { prim, args, annots } => (prim.as_str(), args, annots),
            other => {
                return Err(EncodingError::InvalidSchema(format!(
                    "expected a type primitive, found {}",
                    other.describe()
                )))
            }
        };

        let arity = |n: usize| -> Result<(), EncodingError> {
            if args.len() == n {
                Ok(())
            } else {
                Err(EncodingError::InvalidSchema(format!(
                    "{prim} takes {n} arguments, found {}",
                    args.len()
                )))
            }
        };
        let arg = |i: usize| Type::from_micheline(&args[i]).map(Box::new);

        let ty = match prim {
            "unit" => arity(0).map(|_| Type::Unit)?,
            "bool" => arity(0).map(|_| Type::Bool)?,
            "int" => arity(0).map(|_| Type::Int)?,
            "nat" => arity(0).map(|_| Type::Nat)?,
            "mutez" => arity(0).map(|_| Type::Mutez)?,
            "string" => arity(0).map(|_| Type::String)?,
            "bytes" => arity(0).map(|_| Type::Bytes)?,
            "timestamp" => arity(0).map(|_| Type::Timestamp)?,
            "address" => arity(0).map(|_| Type::Address)?,
            "key" => arity(0).map(|_| Type::Key)?,
            "key_hash" => arity(0).map(|_| Type::KeyHash)?,
            "signature" => arity(0).map(|_| Type::Signature)?,
            "chain_id" => arity(0).map(|_| Type::ChainId)?,
            "operation" => arity(0).map(|_| Type::Operation)?,
            "option" => {
                arity(1)?;
                Type::Option(arg(0)?)
            }
            "list" => {
                arity(1)?;
                Type::List(arg(0)?)
            }
            "set" => {
                arity(1)?;
                Type::Set(arg(0)?)
            }
            "contract" => {
                arity(1)?;
                Type::Contract(arg(0)?)
            }
            "map" => {
                arity(2)?;
                Type::Map(arg(0)?, arg(1)?)
            }
            "big_map" => {
                arity(2)?;
                Type::BigMap(arg(0)?, arg(1)?)
            }
            "or" => {
                arity(2)?;
                Type::Or(arg(0)?, arg(1)?)
            }
            "lambda" => {
                arity(2)?;
                Type::Lambda(arg(0)?, arg(1)?)
            }
            "pair" => Type::comb(
                args.iter().map(Type::from_micheline).collect::<Result<Vec<_>, _>>()?,
            )?,
            other => {
                return Err(EncodingError::InvalidSchema(format!("unsupported type '{other}'")))
            }
        };

        if let Type::Map(key, _) | Type::BigMap(key, _) | Type::Set(key) = &ty {
            if !key.is_comparable() {
                return Err(EncodingError::NotComparable(key.to_string()));
            }
        }

        match annots.iter().find_map(|a| a.strip_prefix('%')) {
            Some(name) if !name.is_empty() => Ok(Type::field(name, ty)),
            _ => Ok(ty),
        }
    }

    /// Type expression with field annotations.
    pub fn to_micheline(&self) -> Micheline {
        let (name, args) = match self {
            Type::Field(field, inner) => {
                return match inner.to_micheline() {
                    Micheline::Prim { prim, args, .. } => {
                        Micheline::prim_annotated(&prim, args, vec![format!("%{field}")])
                    }
                    other => other,
                }
            }
            Type::Unit => ("unit", vec![]),
            Type::Bool => ("bool", vec![]),
            Type::Int => ("int", vec![]),
            Type::Nat => ("nat", vec![]),
            Type::Mutez => ("mutez", vec![]),
            Type::String => ("string", vec![]),
            Type::Bytes => ("bytes", vec![]),
            Type::Timestamp => ("timestamp", vec![]),
            Type::Address => ("address", vec![]),
            Type::Key => ("key", vec![]),
            Type::KeyHash => ("key_hash", vec![]),
            Type::Signature => ("signature", vec![]),
            Type::ChainId => ("chain_id", vec![]),
            Type::Operation => ("operation", vec![]),
            Type::Option(a) => ("option", vec![a.to_micheline()]),
            Type::List(a) => ("list", vec![a.to_micheline()]),
            Type::Set(a) => ("set", vec![a.to_micheline()]),
            Type::Contract(a) => ("contract", vec![a.to_micheline()]),
            Type::Map(a, b) => ("map", vec![a.to_micheline(), b.to_micheline()]),
            Type::BigMap(a, b) => ("big_map", vec![a.to_micheline(), b.to_micheline()]),
            Type::Pair(a, b) => ("pair", vec![a.to_micheline(), b.to_micheline()]),
            Type::Or(a, b) => ("or", vec![a.to_micheline(), b.to_micheline()]),
            Type::Lambda(a, b) => ("lambda", vec![a.to_micheline(), b.to_micheline()]),
        };
        Micheline::prim(name, args)
    }
}

fn collect_fields<'a>(ty: &'a Type, out: &mut Vec<(&'a str, &'a Type)>) {
    match ty {
        Type::Field(name, inner) => out.push((name, inner)),
        Type::Pair(a, b) => {
            collect_fields(a, out);
            collect_fields(b, out);
        }
        _ => {}
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write(node: &Micheline, f: &mut fmt::Formatter<'_>, nested: bool) -> fmt::Result {
            if let Micheline::Prim { prim, args, annots } = node {
                let wrap = nested && (!args.is_empty() || !annots.is_empty());
                if wrap {
                    f.write_str("(")?;
                }
                f.write_str(prim)?;
                for annot in annots {
                    write!(f, " {annot}")?;
                }
                for arg in args {
                    f.write_str(" ")?;
                    write(arg, f, true)?;
                }
                if wrap {
                    f.write_str(")")?;
                }
            }
            Ok(())
        }
        write(&self.to_micheline(), f, false)
    }
}

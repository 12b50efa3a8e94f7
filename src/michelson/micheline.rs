//! Untyped Micheline nodes and their JSON form.

use std::fmt;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

/// A Micheline expression.
///
/// Serializes to the node's JSON form (`{"int": "1"}`, `{"prim": "Pair",
/// "args": [...]}`, `[...]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Micheline {
    Int {
        #[serde(with = "decimal_string")]
        int: BigInt,
    },
    String {
        string: String,
    },
    Bytes {
        #[serde(with = "hex_string")]
        bytes: Vec<u8>,
    },
    Prim {
        prim: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<Micheline>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        annots: Vec<String>,
    },
    Seq(Vec<Micheline>),
}

impl Micheline {
    pub fn int(value: impl Into<BigInt>) -> Self {
        Micheline::Int { int: value.into() }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Micheline::String { string: value.into() }
    }

    pub fn bytes(value: impl Into<Vec<u8>>) -> Self {
        Micheline::Bytes { bytes: value.into() }
    }

    pub fn seq(items: Vec<Micheline>) -> Self {
        Micheline::Seq(items)
    }

    pub fn prim(name: &str, args: Vec<Micheline>) -> Self {
        Micheline::Prim { prim: name.to_string(), args, annots: Vec::new() }
    }

    pub fn prim_annotated(name: &str, args: Vec<Micheline>, annots: Vec<String>) -> Self {
        Micheline::Prim { prim: name.to_string(), args, annots }
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Micheline::Int { int } => format!("int {int}"),
            Micheline::String { string } => format!("string {string:?}"),
            Micheline::Bytes { bytes } => format!("bytes 0x{}", hex::encode(bytes)),
            Micheline::Prim { prim, .. } => format!("primitive {prim}"),
            Micheline::Seq(items) => format!("sequence of {} items", items.len()),
        }
    }
}

impl fmt::Display for Micheline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str(&self.describe()),
        }
    }
}

mod decimal_string {
    use num_bigint::BigInt;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &BigInt, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BigInt, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(de::Error::custom)
    }
}

mod hex_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_shapes() {
        let node = Micheline::prim(
            "Pair",
            vec![Micheline::int(100), Micheline::string("tz1"), Micheline::bytes(vec![0xca, 0xfe])],
        );
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(
            value,
            json!({"prim": "Pair", "args": [{"int": "100"}, {"string": "tz1"}, {"bytes": "cafe"}]})
        );
    }

    #[test]
    fn test_parse_type_expression() {
        let node: Micheline = serde_json::from_value(json!({
            "prim": "pair",
            "args": [{"prim": "nat", "annots": ["%amount"]}, {"prim": "address"}]
        }))
        .unwrap();
        match node {
            Micheline::Prim { prim, args, annots } => {
                assert_eq!(prim, "pair");
                assert!(annots.is_empty());
                assert_eq!(
                    args[0],
                    Micheline::prim_annotated("nat", vec![], vec!["%amount".into()])
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_sequence_and_negative_int() {
        let node: Micheline = serde_json::from_str(r#"[{"int": "-42"}, []]"#).unwrap();
        assert_eq!(
            node,
            Micheline::seq(vec![Micheline::int(-42), Micheline::seq(vec![])])
        );
    }
}

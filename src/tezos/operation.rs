//! Operation requests and the unsigned operation bodies built from them.
//!
//! An [`OperationRequest`] says what to do (call an entry point, originate a
//! contract). The submitter turns it into an [`UnsignedOperation`] once the
//! counter, branch and limits are known.

use serde::{Serialize, Serializer};

use crate::crypto::{Address, PublicKey};
use crate::michelson::{EncodingError, Micheline, Type, Value};
use crate::tezos::types::{TezosError, TezosResult};

fn as_string<S: Serializer>(value: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Fields shared by every manager operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manager {
    pub source: String,
    #[serde(serialize_with = "as_string")]
    pub fee: u64,
    #[serde(serialize_with = "as_string")]
    pub counter: u64,
    #[serde(serialize_with = "as_string")]
    pub gas_limit: u64,
    #[serde(serialize_with = "as_string")]
    pub storage_limit: u64,
}

impl Manager {
    pub fn new(source: &Address, counter: u64) -> Self {
        Self { source: source.to_string(), fee: 0, counter, gas_limit: 0, storage_limit: 0 }
    }
}

/// Entry point and argument of a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameters {
    pub entrypoint: String,
    pub value: Micheline,
}

/// Code and initial storage of a new contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Script {
    pub code: Micheline,
    pub storage: Micheline,
}

/// One content of an operation, in the node's JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Reveal {
        #[serde(flatten)]
        manager: Manager,
        public_key: String,
    },
    Transaction {
        #[serde(flatten)]
        manager: Manager,
        #[serde(serialize_with = "as_string")]
        amount: u64,
        destination: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<Parameters>,
    },
    Origination {
        #[serde(flatten)]
        manager: Manager,
        #[serde(serialize_with = "as_string")]
        balance: u64,
        script: Script,
    },
}

impl Content {
    pub fn reveal(manager: Manager, public_key: &PublicKey) -> Self {
        Content::Reveal { manager, public_key: public_key.to_string() }
    }

    pub fn manager(&self) -> &Manager {
        match self {
            Content::Reveal { manager, .. }
            | Content::Transaction { manager, .. }
            | Content::Origination { manager, .. } => manager,
        }
    }

    pub fn manager_mut(&mut self) -> &mut Manager {
        match self {
            Content::Reveal { manager, .. }
            | Content::Transaction { manager, .. }
            | Content::Origination { manager, .. } => manager,
        }
    }

    /// Tez moved out of the source besides fees and burn.
    pub fn spent(&self) -> u64 {
        match self {
            Content::Reveal { .. } => 0,
            Content::Transaction { amount, .. } => *amount,
            Content::Origination { balance, .. } => *balance,
        }
    }
}

/// An operation ready for simulation, forging or signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnsignedOperation {
    pub branch: String,
    pub contents: Vec<Content>,
}

impl UnsignedOperation {
    pub fn total_fee(&self) -> u64 {
        self.contents.iter().map(|c| c.manager().fee).sum()
    }

    pub fn total_storage_limit(&self) -> u64 {
        self.contents.iter().map(|c| c.manager().storage_limit).sum()
    }

    pub fn total_spent(&self) -> u64 {
        self.contents.iter().map(Content::spent).sum()
    }
}

/// Argument of a contract call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// A value checked against its type; the type is also compared with the
    /// contract's own entry point type before submission.
    Typed { ty: Type, value: Value },
    /// Pre-encoded Micheline passed through unchanged.
    Raw(Micheline),
}

impl Arguments {
    pub fn to_micheline(&self) -> Result<Micheline, EncodingError> {
        match self {
            Arguments::Typed { ty, value } => value.to_micheline(ty),
            Arguments::Raw(node) => Ok(node.clone()),
        }
    }
}

/// What an operation should do.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Call {
        destination: Address,
        entrypoint: String,
        arguments: Arguments,
        amount: u64,
    },
    Originate {
        code: Micheline,
        storage: Micheline,
        balance: u64,
    },
}

impl OperationRequest {
    /// Call `entrypoint` with a typed argument.
    ///
    /// The value is encoded immediately, so a mismatch surfaces here and no
    /// request is built.
    pub fn call(destination: Address, entrypoint: &str, ty: Type, value: Value) -> Result<Self, EncodingError> {
        value.to_micheline(&ty)?;
        Ok(OperationRequest::Call {
            destination,
            entrypoint: entrypoint.to_string(),
            arguments: Arguments::Typed { ty, value },
            amount: 0,
        })
    }

    /// Call `entrypoint` with an argument that is already Micheline.
    pub fn call_raw(destination: Address, entrypoint: &str, argument: Micheline) -> Self {
        OperationRequest::Call {
            destination,
            entrypoint: entrypoint.to_string(),
            arguments: Arguments::Raw(argument),
            amount: 0,
        }
    }

    pub fn originate(code: Micheline, storage: Micheline, balance: u64) -> Self {
        OperationRequest::Originate { code, storage, balance }
    }

    /// Attach tez to a call.
    pub fn with_amount(mut self, mutez: u64) -> Self {
        if let OperationRequest::Call { amount, .. } = &mut self {
            *amount = mutez;
        }
        self
    }

    /// Structural checks that need no node.
    pub fn validate(&self) -> TezosResult<()> {
        match self {
            OperationRequest::Call { destination, entrypoint, .. } => {
                if entrypoint.is_empty() || entrypoint.len() > 31 {
                    return Err(TezosError::UnknownEntrypoint {
                        contract: destination.to_string(),
                        entrypoint: entrypoint.clone(),
                    });
                }
                if !destination.is_originated() {
                    return Err(TezosError::ContractNotFound(destination.to_string()));
                }
                Ok(())
            }
            OperationRequest::Originate { code, .. } => match code {
                Micheline::Seq(sections) if sections.len() >= 3 => Ok(()),
                other => Err(EncodingError::InvalidSchema(format!(
                    "contract code must be a sequence of parameter, storage and code sections, found {}",
                    other.describe()
                ))
                .into()),
            },
        }
    }

    /// Content for this request under the given manager fields.
    pub fn to_content(&self, manager: Manager) -> TezosResult<Content> {
        Ok(match self {
            OperationRequest::Call { destination, entrypoint, arguments, amount } => Content::Transaction {
                manager,
                amount: *amount,
                destination: destination.without_entrypoint().to_string(),
                parameters: Some(Parameters {
                    entrypoint: entrypoint.clone(),
                    value: arguments.to_micheline()?,
                }),
            },
            OperationRequest::Originate { code, storage, balance } => Content::Origination {
                manager,
                balance: *balance,
                script: Script { code: code.clone(), storage: storage.clone() },
            },
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OperationRequest::Call { .. } => "transaction",
            OperationRequest::Originate { .. } => "origination",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyHash;
    use serde_json::json;

    fn source() -> Address {
        Address::implicit(KeyHash::Ed25519([1; 20]))
    }

    #[test]
    fn test_transaction_json_shape() {
        let destination = Address::originated([2; 20]);
        let request = OperationRequest::call(
            destination.clone(),
            "execute",
            Type::pair(Type::field("actionName", Type::String), Type::field("data", Type::Bytes)),
            Value::pair(Value::string("mint"), Value::bytes(vec![0x05])),
        )
        .unwrap();

        let mut manager = Manager::new(&source(), 8);
        manager.fee = 1_234;
        manager.gas_limit = 5_000;
        manager.storage_limit = 67;
        let content = request.to_content(manager).unwrap();

        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!({
                "kind": "transaction",
                "source": source().to_string(),
                "fee": "1234",
                "counter": "8",
                "gas_limit": "5000",
                "storage_limit": "67",
                "amount": "0",
                "destination": destination.to_string(),
                "parameters": {
                    "entrypoint": "execute",
                    "value": {
                        "prim": "Pair",
                        "args": [{ "string": "mint" }, { "bytes": "05" }]
                    }
                }
            })
        );
    }

    #[test]
    fn test_reveal_json_shape() {
        let key = PublicKey::Ed25519([9; 32]);
        let content = Content::reveal(Manager::new(&source(), 1), &key);
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["kind"], "reveal");
        assert_eq!(json["public_key"], key.to_string());
        assert_eq!(json["counter"], "1");
    }

    #[test]
    fn test_mismatched_call_is_refused() {
        let result = OperationRequest::call(
            Address::originated([2; 20]),
            "execute",
            Type::pair(Type::String, Type::Bytes),
            Value::pair(Value::nat(1), Value::bytes(vec![])),
        );
        assert!(matches!(result, Err(EncodingError::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate() {
        let implicit = OperationRequest::call_raw(source(), "default", Micheline::prim("Unit", vec![]));
        assert!(matches!(implicit.validate(), Err(TezosError::ContractNotFound(_))));

        let unnamed = OperationRequest::call_raw(Address::originated([2; 20]), "", Micheline::prim("Unit", vec![]));
        assert!(matches!(unnamed.validate(), Err(TezosError::UnknownEntrypoint { .. })));

        let bad_code = OperationRequest::originate(Micheline::int(1), Micheline::int(0), 0);
        assert!(matches!(bad_code.validate(), Err(TezosError::Encoding(_))));
    }

    #[test]
    fn test_totals() {
        let mut reveal = Content::reveal(Manager::new(&source(), 1), &PublicKey::Ed25519([9; 32]));
        reveal.manager_mut().fee = 300;
        let mut call = OperationRequest::call_raw(Address::originated([2; 20]), "default", Micheline::prim("Unit", vec![]))
            .with_amount(1_000)
            .to_content(Manager::new(&source(), 2))
            .unwrap();
        call.manager_mut().fee = 700;
        call.manager_mut().storage_limit = 40;

        let op = UnsignedOperation { branch: "BL".into(), contents: vec![reveal, call] };
        assert_eq!(op.total_fee(), 1_000);
        assert_eq!(op.total_spent(), 1_000);
        assert_eq!(op.total_storage_limit(), 40);
    }
}

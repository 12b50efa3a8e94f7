//! Structured payload encoder.
//!
//! # Data Flow
//! ```text
//! Type (schema tree) + Value (typed value tree)
//!     → value.rs (type check, optimized Micheline)
//!     → binary.rs (tagged, length-prefixed binary form)
//!     → pack.rs (0x05 ‖ binary)
//!
//! bytes → binary.rs → Micheline → value.rs (type check) → Value
//! ```
//!
//! # Invariants
//! - Encoding is deterministic: one (type, value) pair, one byte string
//! - `unpack(ty, pack(ty, v)) == v` for every well-typed `v`
//! - A mismatch fails with [`EncodingError`] and produces no bytes

pub mod binary;
pub mod error;
pub mod micheline;
pub mod pack;
pub mod primitives;
pub mod text;
pub mod types;
pub mod value;

pub use error::EncodingError;
pub use micheline::Micheline;
pub use pack::{pack, unpack};
pub use types::Type;
pub use value::Value;

//! Resilience helpers.
//!
//! Every node call already carries a request timeout (see
//! [`crate::tezos::client`]); this module decides how long to wait before
//! polling again after a failure.

pub mod backoff;

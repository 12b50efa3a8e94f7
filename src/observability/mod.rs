//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! main
//!     → logging.rs (subscriber: level filter + pretty or JSON output)
//!     → tracing.rs (per-run span with a run id)
//!
//! All subsystems emit tracing events inside that span.
//! ```

pub mod logging;
pub mod tracing;

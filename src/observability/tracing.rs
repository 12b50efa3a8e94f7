//! Run correlation.
//!
//! Each invocation gets a random run id; every event logged while the action
//! runs carries it through the enclosing span.

use tracing::Span;
use uuid::Uuid;

/// Span covering one action run.
pub fn run_span(action: &str) -> Span {
    let run_id = Uuid::new_v4();
    tracing::info_span!("run", %run_id, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_span_is_created_without_subscriber() {
        let span = run_span("mint");
        let _guard = span.enter();
    }
}

//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based); zero for attempt 0.
///
/// Doubles from `base_ms` up to `max_ms`, then adds up to 10% jitter so
/// concurrent runs do not poll a node in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 500, 10_000), Duration::ZERO);

        let first = calculate_backoff(1, 500, 10_000).as_millis();
        assert!((500..550).contains(&first));

        let third = calculate_backoff(3, 500, 10_000).as_millis();
        assert!((2_000..2_200).contains(&third));

        let capped = calculate_backoff(30, 500, 10_000).as_millis();
        assert!((10_000..11_000).contains(&capped));
    }

    #[test]
    fn test_small_delays_have_no_jitter() {
        assert_eq!(calculate_backoff(1, 5, 5), Duration::from_millis(5));
    }
}

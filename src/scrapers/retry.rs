//! Retry policy for classified attempts.

use std::time::Duration;

use super::classifier::{AttemptOutcome, OutcomeKind};

/// Longest backoff between attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after waiting this long (on top of the regular pacing delay).
    Retry(Duration),
    StopSuccess,
    StopFailure,
}

/// Bounded retry for transient failures only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Backoff before retry `n` is `backoff_base * 2^(n-1)`, capped.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base: Duration) -> Self {
        Self {
            max_retries,
            backoff_base,
        }
    }

    /// Decide the next step given the outcome of attempt number `attempt`
    /// (1-based).
    pub fn decide(&self, outcome: &AttemptOutcome, attempt: u32) -> RetryDecision {
        match outcome.kind {
            OutcomeKind::Success => RetryDecision::StopSuccess,
            OutcomeKind::TransientFailure if attempt <= self.max_retries => {
                let backoff = self.backoff(attempt);
                let wait = outcome
                    .retry_after
                    .map(|ra| ra.max(backoff))
                    .unwrap_or(backoff);
                RetryDecision::Retry(wait)
            }
            _ => RetryDecision::StopFailure,
        }
    }

    /// Total attempts this policy allows for one request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(2u32.pow(exp))
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(kind: OutcomeKind) -> AttemptOutcome {
        AttemptOutcome {
            kind,
            retriable: kind.is_retriable(),
            raw_status: Some(500),
            message: String::new(),
            rule: None,
            retry_after: None,
        }
    }

    #[test]
    fn test_transient_retried_until_bound() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100));
        let transient = outcome(OutcomeKind::TransientFailure);
        assert_eq!(
            policy.decide(&transient, 1),
            RetryDecision::Retry(Duration::from_millis(100))
        );
        assert_eq!(
            policy.decide(&transient, 2),
            RetryDecision::Retry(Duration::from_millis(200))
        );
        assert_eq!(policy.decide(&transient, 3), RetryDecision::StopFailure);
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_terminal_kinds_never_retried() {
        let policy = RetryPolicy::default();
        for kind in [
            OutcomeKind::QuotaExhausted,
            OutcomeKind::Blocked,
            OutcomeKind::Malformed,
        ] {
            assert_eq!(policy.decide(&outcome(kind), 1), RetryDecision::StopFailure);
        }
        assert_eq!(
            policy.decide(&outcome(OutcomeKind::Success), 1),
            RetryDecision::StopSuccess
        );
    }

    #[test]
    fn test_retry_after_extends_backoff() {
        let policy = RetryPolicy::new(1, Duration::from_millis(10));
        let mut throttled = outcome(OutcomeKind::TransientFailure);
        throttled.retry_after = Some(Duration::from_secs(3));
        assert_eq!(
            policy.decide(&throttled, 1),
            RetryDecision::Retry(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_backoff_capped() {
        let policy = RetryPolicy::new(30, Duration::from_secs(10));
        assert_eq!(
            policy.decide(&outcome(OutcomeKind::TransientFailure), 20),
            RetryDecision::Retry(MAX_BACKOFF)
        );
    }

    #[test]
    fn test_zero_retries() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(
            policy.decide(&outcome(OutcomeKind::TransientFailure), 1),
            RetryDecision::StopFailure
        );
    }
}

//! The Spanner-aware retry policy bundled with the proxy for upstream
//! Cassandra drivers. The proxy itself never retries a request; this is
//! consulted by the client driver's retry layer, which is why it is
//! exposed as a small, dependency-free function rather than wired into the
//! connection handler.

/// The Cassandra-level failure kinds this policy has an opinion about.
/// Everything else is delegated to the driver's default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ReadFailure,
    WriteFailure,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the same request against the same coordinator — Spanner is
    /// modeled as a single node from the client's point of view, so there
    /// is no "different node" to retry against.
    RetrySameCoordinator,
    /// Delegate to the driver's default policy (which may itself retry or
    /// give up).
    Rethrow,
}

const MAX_RETRIES: u32 = 10;

const TRANSIENT_MARKERS: &[&str] = &[
    "HTTP/2 error code: INTERNAL_ERROR",
    "Connection closed with unknown cause",
    "Received unexpected EOS on DATA frame from server",
    "stream terminated by RST_STREAM",
    "Authentication backend internal server error. Please retry.",
    "DEADLINE_EXCEEDED",
    "ABORTED",
    "RESOURCE_EXHAUSTED",
    "UNAVAILABLE",
];

/// Decides whether a Cassandra-level failure observed by the driver should
/// be retried on the same coordinator.
pub fn decide(kind: FailureKind, message: &str, retry_count: u32) -> RetryDecision {
    if !matches!(kind, FailureKind::ReadFailure | FailureKind::WriteFailure) {
        return RetryDecision::Rethrow;
    }

    let has_transient_marker = TRANSIENT_MARKERS
        .iter()
        .any(|marker| message.contains(marker));

    if has_transient_marker && retry_count <= MAX_RETRIES {
        RetryDecision::RetrySameCoordinator
    } else {
        RetryDecision::Rethrow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_write_failure_with_aborted_marker_under_the_limit() {
        let decision = decide(FailureKind::WriteFailure, "transaction ABORTED by backend", 3);
        assert_eq!(decision, RetryDecision::RetrySameCoordinator);
    }

    #[test]
    fn rethrows_once_retry_count_exceeds_the_limit() {
        let decision = decide(FailureKind::WriteFailure, "transaction ABORTED by backend", 11);
        assert_eq!(decision, RetryDecision::Rethrow);
    }

    #[test]
    fn rethrows_when_message_has_no_transient_marker() {
        let decision = decide(FailureKind::WriteFailure, "constraint violation", 0);
        assert_eq!(decision, RetryDecision::Rethrow);
    }

    #[test]
    fn delegates_kinds_other_than_read_or_write_failure() {
        let decision = decide(FailureKind::Other, "UNAVAILABLE: no replicas", 0);
        assert_eq!(decision, RetryDecision::Rethrow);
    }

    #[test]
    fn every_transient_marker_triggers_a_retry() {
        for marker in TRANSIENT_MARKERS {
            let message = format!("upstream said: {marker}");
            assert_eq!(
                decide(FailureKind::ReadFailure, &message, 0),
                RetryDecision::RetrySameCoordinator,
                "marker {marker:?} should be retryable"
            );
        }
    }

    #[test]
    fn boundary_retry_count_is_still_retryable() {
        assert_eq!(
            decide(FailureKind::ReadFailure, "DEADLINE_EXCEEDED", 10),
            RetryDecision::RetrySameCoordinator
        );
        assert_eq!(
            decide(FailureKind::ReadFailure, "DEADLINE_EXCEEDED", 11),
            RetryDecision::Rethrow
        );
    }
}

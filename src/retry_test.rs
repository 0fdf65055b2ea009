use super::*;

const POLICY: RetryPolicy = RetryPolicy { max_retries: 3, delay: Duration::from_millis(1000) };

fn conn() -> AuthFailure {
    AuthFailure::ConnectionFailed("connection refused".into())
}

fn unexpected() -> AuthFailure {
    AuthFailure::UnexpectedError("status 502".into())
}

// =============================================================================
// RetryPolicy::decide
// =============================================================================

#[test]
fn connection_failure_retries_until_limit() {
    for spent in 0..3 {
        assert_eq!(
            POLICY.decide(spent, &conn()),
            RetryDecision::Retry { attempt: spent + 1, delay: Duration::from_millis(1000) }
        );
    }
    assert_eq!(POLICY.decide(3, &conn()), RetryDecision::GiveUp { clear_user: false });
}

#[test]
fn unexpected_error_retries_then_clears_user() {
    assert!(matches!(POLICY.decide(0, &unexpected()), RetryDecision::Retry { attempt: 1, .. }));
    assert_eq!(POLICY.decide(3, &unexpected()), RetryDecision::GiveUp { clear_user: true });
}

#[test]
fn unauthenticated_is_never_retried() {
    assert_eq!(POLICY.decide(0, &AuthFailure::Unauthenticated), RetryDecision::GiveUp { clear_user: true });
}

#[test]
fn zero_retry_policy_gives_up_immediately() {
    let policy = RetryPolicy { max_retries: 0, delay: Duration::ZERO };
    assert_eq!(policy.decide(0, &conn()), RetryDecision::GiveUp { clear_user: false });
}

// =============================================================================
// AuthPhase
// =============================================================================

#[test]
fn terminal_phases() {
    assert!(AuthPhase::Authenticated.is_terminal());
    assert!(AuthPhase::Unauthenticated.is_terminal());
    assert!(AuthPhase::GivenUp.is_terminal());
    assert!(!AuthPhase::Init.is_terminal());
    assert!(!AuthPhase::Checking.is_terminal());
    assert!(!AuthPhase::AwaitingRetry.is_terminal());
}

#[test]
fn retry_loop_transitions_are_legal() {
    use AuthPhase::*;
    assert!(Init.can_transition_to(Checking));
    assert!(Checking.can_transition_to(AwaitingRetry));
    assert!(AwaitingRetry.can_transition_to(Checking));
    assert!(Checking.can_transition_to(GivenUp));
    assert!(Checking.can_transition_to(Authenticated));
    assert!(Checking.can_transition_to(Unauthenticated));
    assert!(GivenUp.can_transition_to(Checking));
}

#[test]
fn illegal_transitions() {
    use AuthPhase::*;
    assert!(!Checking.can_transition_to(Init));
    assert!(!Authenticated.can_transition_to(Init));
    assert!(!Checking.can_transition_to(Checking));
    assert!(!Init.can_transition_to(AwaitingRetry));
    assert!(!Init.can_transition_to(GivenUp));
    assert!(!Authenticated.can_transition_to(AwaitingRetry));
}

#[test]
fn login_and_logout_reach_settled_phases_from_anywhere() {
    use AuthPhase::*;
    for phase in [Init, Checking, AwaitingRetry, Authenticated, Unauthenticated, GivenUp] {
        assert!(phase.can_transition_to(Authenticated), "{phase:?}");
        assert!(phase.can_transition_to(Unauthenticated), "{phase:?}");
    }
}

#[test]
fn phase_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&AuthPhase::AwaitingRetry).unwrap(), "\"awaiting_retry\"");
}

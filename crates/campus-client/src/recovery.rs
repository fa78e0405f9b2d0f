//! Response recovery state machine.
//!
//! [`step`] is a pure reducer over `(state, event)`. It never performs I/O;
//! it returns the effects the caller must carry out, and the caller feeds the
//! result of those effects back in as the next event. The client's request
//! loop in [`crate::client`] is the only driver.
//!
//! ```text
//!  Normal ──401, not retried──▶ Renewing ──Renewed──▶ Normal (replay)
//!    │                             │
//!    └─anything else─▶ deliver     └─RenewalFailed──▶ Failed
//! ```

use crate::error::Error;

/// HTTP status signalling a rejected access token.
pub const AUTH_FAILURE_STATUS: u16 = 401;

/// Where a logical call is in the recovery protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Waiting for a response to the original call or its replay.
    Normal,
    /// A renewal is in progress on behalf of this call.
    Renewing,
    /// Renewal failed; the call is over.
    Failed,
}

/// Why a renewal did not produce a new access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalFailure {
    /// No refresh token was stored; no network call was made.
    MissingRefreshToken,
    /// The refresh endpoint answered with a non-success status.
    Rejected { status: u16, message: String },
    /// The refresh call never got a response.
    Transport(String),
}

impl RenewalFailure {
    /// Convert into the error surfaced to the original caller.
    pub fn into_error(self) -> Error {
        match self {
            RenewalFailure::MissingRefreshToken => Error::Renewal {
                status: None,
                message: "no refresh token available".to_string(),
            },
            RenewalFailure::Rejected { status, message } => Error::Renewal {
                status: Some(status),
                message,
            },
            RenewalFailure::Transport(message) => Error::Renewal {
                status: None,
                message,
            },
        }
    }
}

/// Input to the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A response (or transport failure, `status: None`) arrived for the call.
    Completed { status: Option<u16>, retried: bool },
    /// The renewal produced a new access token.
    Renewed { access_token: String },
    /// The renewal failed.
    RenewalFailed(RenewalFailure),
}

impl Event {
    pub fn completed(status: Option<u16>, retried: bool) -> Self {
        Event::Completed { status, retried }
    }
}

/// Work the driver must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Set the call's `retried` flag.
    MarkRetried,
    /// Obtain a new access token (may join an in-flight renewal).
    Renew,
    /// Re-send the original request carrying `access_token`.
    Replay { access_token: String },
    /// Wipe the session store.
    ClearSession,
    /// Tell the UI layer the session is gone (login redirect).
    SessionExpired,
    /// Return the current outcome to the caller. `notify` requests a
    /// user-visible notification for a failed outcome.
    Deliver { notify: bool },
    /// Return the renewal error to the caller.
    Fail(RenewalFailure),
}

/// Result of one reducer step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: RecoveryState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: RecoveryState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }

    /// True when the effects end the call.
    #[cfg(test)]
    fn is_terminal(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, Effect::Deliver { .. } | Effect::Fail(_)))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Advance the recovery state machine by one event.
///
/// Events that make no sense in the current state leave it unchanged and
/// produce no effects.
pub fn step(state: RecoveryState, event: Event) -> Transition {
    use RecoveryState::*;

    match (state, event) {
        (Normal, Event::Completed { status, retried }) => match status {
            Some(s) if is_success(s) => Transition::to(Normal, vec![Effect::Deliver { notify: false }]),
            Some(AUTH_FAILURE_STATUS) if !retried => {
                Transition::to(Renewing, vec![Effect::MarkRetried, Effect::Renew])
            }
            // A second rejection is not recoverable; the redirect (or the
            // caller) handles it, so no notification either.
            Some(AUTH_FAILURE_STATUS) => Transition::to(Normal, vec![Effect::Deliver { notify: false }]),
            _ => Transition::to(Normal, vec![Effect::Deliver { notify: true }]),
        },
        (Renewing, Event::Renewed { access_token }) => {
            Transition::to(Normal, vec![Effect::Replay { access_token }])
        }
        (Renewing, Event::RenewalFailed(failure)) => Transition::to(
            Failed,
            vec![Effect::ClearSession, Effect::SessionExpired, Effect::Fail(failure)],
        ),
        (state, _) => Transition::to(state, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(effects: &[Transition], wanted: fn(&Effect) -> bool) -> usize {
        effects
            .iter()
            .flat_map(|t| t.effects.iter())
            .filter(|e| wanted(e))
            .count()
    }

    /// Run a logical call where every response carries `status`, driving the
    /// reducer the way the client does.
    fn drive(status: u16, renewal: Result<&str, RenewalFailure>) -> Vec<Transition> {
        let mut state = RecoveryState::Normal;
        let mut retried = false;
        let mut event = Event::completed(Some(status), retried);
        let mut history = Vec::new();

        for _ in 0..16 {
            let transition = step(state, event.clone());
            state = transition.state;
            history.push(transition.clone());
            if transition.is_terminal() {
                break;
            }
            let mut next = None;
            for effect in transition.effects {
                match effect {
                    Effect::MarkRetried => retried = true,
                    Effect::Renew => {
                        next = Some(match &renewal {
                            Ok(token) => Event::Renewed {
                                access_token: token.to_string(),
                            },
                            Err(failure) => Event::RenewalFailed(failure.clone()),
                        })
                    }
                    Effect::Replay { .. } => next = Some(Event::completed(Some(status), retried)),
                    _ => {}
                }
            }
            match next {
                Some(e) => event = e,
                None => break,
            }
        }
        history
    }

    #[test]
    fn test_success_passes_through() {
        let t = step(RecoveryState::Normal, Event::completed(Some(200), false));
        assert_eq!(t.state, RecoveryState::Normal);
        assert_eq!(t.effects, vec![Effect::Deliver { notify: false }]);
    }

    #[test]
    fn test_auth_failure_starts_renewal() {
        let t = step(RecoveryState::Normal, Event::completed(Some(401), false));
        assert_eq!(t.state, RecoveryState::Renewing);
        assert_eq!(t.effects, vec![Effect::MarkRetried, Effect::Renew]);
        assert!(!t.is_terminal());
    }

    #[test]
    fn test_auth_failure_after_retry_is_delivered_silently() {
        let t = step(RecoveryState::Normal, Event::completed(Some(401), true));
        assert_eq!(t.state, RecoveryState::Normal);
        assert_eq!(t.effects, vec![Effect::Deliver { notify: false }]);
    }

    #[test]
    fn test_domain_failure_notifies() {
        for status in [400, 403, 404, 409, 422, 500, 503] {
            let t = step(RecoveryState::Normal, Event::completed(Some(status), false));
            assert_eq!(t.effects, vec![Effect::Deliver { notify: true }], "status {status}");
        }
    }

    #[test]
    fn test_transport_failure_notifies() {
        let t = step(RecoveryState::Normal, Event::completed(None, false));
        assert_eq!(t.effects, vec![Effect::Deliver { notify: true }]);
    }

    #[test]
    fn test_renewed_replays_with_new_token() {
        let t = step(
            RecoveryState::Renewing,
            Event::Renewed {
                access_token: "new-at".to_string(),
            },
        );
        assert_eq!(t.state, RecoveryState::Normal);
        assert_eq!(
            t.effects,
            vec![Effect::Replay {
                access_token: "new-at".to_string()
            }]
        );
    }

    #[test]
    fn test_renewal_failure_clears_and_expires() {
        let t = step(
            RecoveryState::Renewing,
            Event::RenewalFailed(RenewalFailure::MissingRefreshToken),
        );
        assert_eq!(t.state, RecoveryState::Failed);
        assert_eq!(
            t.effects,
            vec![
                Effect::ClearSession,
                Effect::SessionExpired,
                Effect::Fail(RenewalFailure::MissingRefreshToken)
            ]
        );
    }

    #[test]
    fn test_failed_is_absorbing() {
        let t = step(RecoveryState::Failed, Event::completed(Some(401), false));
        assert_eq!(t.state, RecoveryState::Failed);
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let t = step(
            RecoveryState::Normal,
            Event::Renewed {
                access_token: "x".to_string(),
            },
        );
        assert_eq!(t, Transition::to(RecoveryState::Normal, Vec::new()));

        let t = step(RecoveryState::Renewing, Event::completed(Some(200), false));
        assert_eq!(t, Transition::to(RecoveryState::Renewing, Vec::new()));
    }

    #[test]
    fn test_at_most_one_renewal_and_replay_when_always_rejected() {
        let history = drive(401, Ok("new-at"));
        assert_eq!(count(&history, |e| matches!(e, Effect::Renew)), 1);
        assert_eq!(count(&history, |e| matches!(e, Effect::Replay { .. })), 1);
        assert_eq!(
            history.last().unwrap().effects,
            vec![Effect::Deliver { notify: false }]
        );
    }

    #[test]
    fn test_renewal_failure_ends_without_replay() {
        let failure = RenewalFailure::Rejected {
            status: 401,
            message: "refresh token expired".to_string(),
        };
        let history = drive(401, Err(failure.clone()));
        assert_eq!(count(&history, |e| matches!(e, Effect::Renew)), 1);
        assert_eq!(count(&history, |e| matches!(e, Effect::Replay { .. })), 0);
        assert_eq!(history.last().unwrap().state, RecoveryState::Failed);
        assert!(history.last().unwrap().effects.contains(&Effect::Fail(failure)));
    }

    #[test]
    fn test_success_never_renews() {
        let history = drive(200, Ok("unused"));
        assert_eq!(history.len(), 1);
        assert_eq!(count(&history, |e| matches!(e, Effect::Renew)), 0);
    }

    #[test]
    fn test_renewal_failure_into_error() {
        let err = RenewalFailure::Rejected {
            status: 403,
            message: "revoked".to_string(),
        }
        .into_error();
        assert!(err.is_session_expired());
        assert_eq!(err.status(), Some(403));
    }
}

//! The task state machine.
//!
//! ```text
//! (none) ──▶ submitted ──▶ working ──▶ completed / failed / rejected
//!                │            │ ▲
//!                │            ▼ │
//!                │     input-required / auth-required
//!                │
//!                └──▶ rejected          any non-terminal ──▶ canceled / failed
//! ```
//!
//! Terminal states (completed, canceled, failed, rejected) have no outgoing
//! edges. `failed` and `canceled` are reachable from every non-terminal state:
//! an executor fault or a cancel request can strike before the task ever
//! reaches `working`.

use crate::a2a::TaskState;
use crate::errors::{ServerError, ServerResult};

/// Whether the state machine permits moving from `from` to `to`.
///
/// Re-asserting the current non-terminal state is permitted; progress updates
/// routinely re-send `working` with a fresh status message. Nothing ever
/// leaves a terminal state.
pub fn is_valid_transition(from: TaskState, to: TaskState) -> bool {
    use TaskState::*;

    if from.is_terminal() {
        return false;
    }
    if from == to {
        return true;
    }
    match (from, to) {
        // A cancel request or executor fault can arrive in any phase.
        (_, Canceled) | (_, Failed) => true,
        (Submitted, Working) | (Submitted, Rejected) => true,
        (Working, InputRequired) | (Working, AuthRequired) => true,
        (Working, Completed) | (Working, Rejected) => true,
        (InputRequired, Working) | (AuthRequired, Working) => true,
        _ => false,
    }
}

/// Validates a transition, producing the error the request handler surfaces.
pub fn validate_transition(from: TaskState, to: TaskState) -> ServerResult<()> {
    if is_valid_transition(from, to) {
        Ok(())
    } else {
        Err(ServerError::InvalidTransition {
            from: format!("{from:?}"),
            to: format!("{to:?}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TaskState::*;

    #[test]
    fn nothing_leaves_a_terminal_state() {
        // Exhaustive over the full (state, state) matrix.
        for from in TaskState::ALL {
            for to in TaskState::ALL {
                if from.is_terminal() {
                    assert!(
                        !is_valid_transition(from, to),
                        "{from:?} -> {to:?} must be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn allowed_edges_match_the_state_machine() {
        let allowed: Vec<(TaskState, TaskState)> = TaskState::ALL
            .iter()
            .flat_map(|&from| TaskState::ALL.iter().map(move |&to| (from, to)))
            .filter(|&(from, to)| from != to && is_valid_transition(from, to))
            .collect();

        let expected = [
            (Submitted, Working),
            (Submitted, Rejected),
            (Submitted, Canceled),
            (Submitted, Failed),
            (Working, InputRequired),
            (Working, AuthRequired),
            (Working, Completed),
            (Working, Rejected),
            (Working, Canceled),
            (Working, Failed),
            (InputRequired, Working),
            (InputRequired, Canceled),
            (InputRequired, Failed),
            (AuthRequired, Working),
            (AuthRequired, Canceled),
            (AuthRequired, Failed),
        ];
        assert_eq!(allowed.len(), expected.len());
        for edge in expected {
            assert!(allowed.contains(&edge), "missing edge {edge:?}");
        }
    }

    #[test]
    fn reasserting_a_non_terminal_state_is_permitted() {
        assert!(is_valid_transition(Working, Working));
        assert!(is_valid_transition(InputRequired, InputRequired));
        assert!(!is_valid_transition(Completed, Completed));
    }

    #[test]
    fn validate_transition_reports_both_states() {
        let err = validate_transition(Completed, Working).unwrap_err();
        assert!(matches!(
            err,
            ServerError::InvalidTransition { ref from, ref to }
                if from == "Completed" && to == "Working"
        ));
    }
}

/*
[INPUT]:  Dispatch lifecycle events
[OUTPUT]: Checked dispatch state transitions
[POS]:    Channel layer - per-dispatch state machine
[UPDATE]: When adding dispatch states
*/

use std::fmt;

/// Lifecycle of a single dispatch; terminal states never change again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingResponse,
    Resolved,
    Failed,
    Cancelled,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Resolved | DispatchState::Failed | DispatchState::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: DispatchState) -> bool {
        match (self, next) {
            (DispatchState::Idle, DispatchState::AwaitingResponse) => true,
            // Failing before anything was sent, e.g. a missing capability
            (DispatchState::Idle, DispatchState::Failed | DispatchState::Cancelled) => true,
            (DispatchState::AwaitingResponse, next) => next.is_terminal(),
            _ => false,
        }
    }

    /// Move to `next`, returning `false` and staying put on an illegal move
    pub fn advance(&mut self, next: DispatchState) -> bool {
        if self.can_transition_to(next) {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Idle => "idle",
            DispatchState::AwaitingResponse => "awaiting-response",
            DispatchState::Resolved => "resolved",
            DispatchState::Failed => "failed",
            DispatchState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

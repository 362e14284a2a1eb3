//! Transfer lifecycle state machine.

use cloudmirror_protocol::TransferState;

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: TransferState,
    pub to: TransferState,
}

/// Tracks the state of one transfer and enforces legal transitions.
///
/// Once a terminal state is reached every further transition fails, so a
/// transfer can finish only once.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: TransferState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
        }
    }

    pub fn current(&self) -> TransferState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn transition(&mut self, to: TransferState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(to) {
            return Err(IllegalTransition {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut sm = StateMachine::new();
        assert_eq!(sm.current(), TransferState::Idle);
        sm.transition(TransferState::Initiating).unwrap();
        sm.transition(TransferState::Transferring).unwrap();
        sm.transition(TransferState::Completed).unwrap();
        assert!(sm.is_terminal());
    }

    #[test]
    fn terminal_is_final() {
        let mut sm = StateMachine::new();
        sm.transition(TransferState::Initiating).unwrap();
        sm.transition(TransferState::Failed).unwrap();

        let err = sm.transition(TransferState::Cancelled).unwrap_err();
        assert_eq!(err.from, TransferState::Failed);
        assert_eq!(err.to, TransferState::Cancelled);
        assert_eq!(sm.current(), TransferState::Failed);
    }

    #[test]
    fn cannot_skip_transferring() {
        let mut sm = StateMachine::new();
        assert!(sm.transition(TransferState::Transferring).is_err());
        sm.transition(TransferState::Initiating).unwrap();
        assert!(sm.transition(TransferState::Completed).is_err());
    }

    #[test]
    fn early_exit_from_idle() {
        let mut failed = StateMachine::new();
        failed.transition(TransferState::Failed).unwrap();

        let mut cancelled = StateMachine::new();
        cancelled.transition(TransferState::Cancelled).unwrap();
        assert!(cancelled.is_terminal());
    }
}

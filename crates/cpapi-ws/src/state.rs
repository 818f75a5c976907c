//! Session lifecycle states.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lifecycle of a session's supervisor.
///
/// `Idle -> Running -> Closing -> Closed`, or `Running -> Closed` directly
/// when the read loop fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, supervisor not started.
    Idle,
    /// Read loop and keepalive are running.
    Running,
    /// Cancellation received, close frame sent, waiting for the read loop.
    Closing,
    /// Finished. Not reusable.
    Closed,
}

impl SessionState {
    const fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Atomic wrapper for session state.
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU32);

impl AtomicSessionState {
    /// Create a new atomic state.
    #[must_use]
    pub const fn new(state: SessionState) -> Self {
        Self(AtomicU32::new(state as u32))
    }

    /// Load the current state.
    #[must_use]
    pub fn load(&self) -> SessionState {
        SessionState::from_u32(self.0.load(Ordering::SeqCst))
    }

    /// Store a new state.
    pub fn store(&self, state: SessionState) {
        self.0.store(state as u32, Ordering::SeqCst);
    }

    /// Move from `from` to `to` if the current state is `from`.
    ///
    /// Returns the state observed before the attempt on failure.
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.0
            .compare_exchange(from as u32, to as u32, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(SessionState::from_u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_enum() {
        assert_eq!(SessionState::Idle as u32, 0);
        assert_eq!(SessionState::Running as u32, 1);
        assert_eq!(SessionState::Closing as u32, 2);
        assert_eq!(SessionState::Closed as u32, 3);
    }

    #[test]
    fn test_atomic_session_state() {
        let state = AtomicSessionState::new(SessionState::Idle);
        assert_eq!(state.load(), SessionState::Idle);

        state.store(SessionState::Running);
        assert_eq!(state.load(), SessionState::Running);
    }

    #[test]
    fn test_transition_only_from_expected_state() {
        let state = AtomicSessionState::new(SessionState::Idle);
        assert_eq!(state.transition(SessionState::Idle, SessionState::Running), Ok(()));
        assert_eq!(
            state.transition(SessionState::Idle, SessionState::Running),
            Err(SessionState::Running)
        );
        assert_eq!(state.transition(SessionState::Running, SessionState::Closed), Ok(()));
        assert_eq!(state.load(), SessionState::Closed);
    }
}

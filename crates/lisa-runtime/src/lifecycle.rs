//! Session lifecycle
//!
//! ```text
//! Disconnected --begin_connect--> Connecting --complete_connect--> Connected
//!       ^                              |                               |
//!       +--------fail_connect----------+                               |
//!       +--------disconnect (any non-initial state)--------------------+
//! ```
//!
//! The microphone flag toggles only while connected. Each connect
//! attempt is numbered so a late completion for an abandoned attempt
//! cannot resurrect the session.

use std::fmt;

use lisa_core::{LisaError, LisaResult};
use tracing::info;

/// Connection state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connect attempt number
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What state readers (UI, dispatcher) see
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub mic_enabled: bool,
}

impl SessionSnapshot {
    /// Label for the connect button
    pub fn connect_label(&self) -> &'static str {
        match self.state {
            SessionState::Disconnected => "Connect",
            SessionState::Connecting => "Connecting...",
            SessionState::Connected => "Disconnect",
        }
    }

    /// Label for the microphone button
    pub fn mic_label(&self) -> &'static str {
        if self.mic_enabled {
            "Mute"
        } else {
            "Unmute"
        }
    }
}

/// Connection and microphone state for one session
#[derive(Debug, Default)]
pub struct SessionLifecycle {
    state: SessionState,
    mic_enabled: bool,
    current_attempt: Option<AttemptId>,
    attempts: u64,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mic_enabled(&self) -> bool {
        self.mic_enabled
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// The attempt a `complete_connect` would currently accept
    pub fn pending_attempt(&self) -> Option<AttemptId> {
        match self.state {
            SessionState::Connecting => self.current_attempt,
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            mic_enabled: self.mic_enabled,
        }
    }

    /// Disconnected → Connecting. A second request while an attempt is
    /// in flight (or a session is up) is rejected, never queued.
    pub fn begin_connect(&mut self) -> LisaResult<AttemptId> {
        match self.state {
            SessionState::Connecting => Err(LisaError::ConnectInProgress),
            SessionState::Connected => Err(LisaError::AlreadyConnected),
            SessionState::Disconnected => {
                self.attempts += 1;
                let attempt = AttemptId(self.attempts);
                self.state = SessionState::Connecting;
                self.current_attempt = Some(attempt);
                info!(%attempt, "session connecting");
                Ok(attempt)
            }
        }
    }

    /// Connecting → Connected. Returns false (and changes nothing) if
    /// `attempt` is not the one in flight.
    pub fn complete_connect(&mut self, attempt: AttemptId, mic_enabled: bool) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.state = SessionState::Connected;
        self.mic_enabled = mic_enabled;
        info!(%attempt, mic_enabled, "session connected");
        true
    }

    /// Connecting → Disconnected after a failed attempt
    pub fn fail_connect(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.reset();
        info!(%attempt, "session connect failed");
        true
    }

    /// Any non-initial state → Disconnected. Returns false if already
    /// disconnected.
    pub fn disconnect(&mut self) -> bool {
        if self.state == SessionState::Disconnected {
            return false;
        }
        self.reset();
        info!("session disconnected");
        true
    }

    /// Set the microphone flag; requires an active session
    pub fn set_mic_enabled(&mut self, enabled: bool) -> LisaResult<()> {
        if !self.is_connected() {
            return Err(LisaError::NotConnected);
        }
        self.mic_enabled = enabled;
        Ok(())
    }

    /// Microphone state a toggle would move to
    pub fn mic_toggle_target(&self) -> LisaResult<bool> {
        if !self.is_connected() {
            return Err(LisaError::NotConnected);
        }
        Ok(!self.mic_enabled)
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.state == SessionState::Connecting && self.current_attempt == Some(attempt)
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.mic_enabled = false;
        self.current_attempt = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let lifecycle = SessionLifecycle::new();
        assert_eq!(lifecycle.state(), SessionState::Disconnected);
        assert!(!lifecycle.mic_enabled());
        assert_eq!(lifecycle.snapshot().connect_label(), "Connect");
    }

    #[test]
    fn test_connect_enables_mic_by_default() {
        let mut lifecycle = SessionLifecycle::new();
        let attempt = lifecycle.begin_connect().unwrap();
        assert_eq!(lifecycle.state(), SessionState::Connecting);

        assert!(lifecycle.complete_connect(attempt, true));
        assert!(lifecycle.is_connected());
        assert!(lifecycle.mic_enabled());
        assert_eq!(lifecycle.snapshot().mic_label(), "Mute");
    }

    #[test]
    fn test_second_connect_while_connecting_is_rejected() {
        let mut lifecycle = SessionLifecycle::new();
        let attempt = lifecycle.begin_connect().unwrap();

        assert_eq!(lifecycle.begin_connect(), Err(LisaError::ConnectInProgress));
        assert_eq!(lifecycle.state(), SessionState::Connecting);

        // the first attempt is still the live one
        assert!(lifecycle.complete_connect(attempt, true));
        assert_eq!(lifecycle.begin_connect(), Err(LisaError::AlreadyConnected));
    }

    #[test]
    fn test_failed_connect_returns_to_disconnected() {
        let mut lifecycle = SessionLifecycle::new();
        let attempt = lifecycle.begin_connect().unwrap();
        assert!(lifecycle.fail_connect(attempt));
        assert_eq!(lifecycle.state(), SessionState::Disconnected);

        // manual reconnect works
        assert!(lifecycle.begin_connect().is_ok());
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut lifecycle = SessionLifecycle::new();
        let first = lifecycle.begin_connect().unwrap();
        assert!(lifecycle.disconnect());

        assert_eq!(lifecycle.pending_attempt(), None);

        let second = lifecycle.begin_connect().unwrap();
        assert_ne!(first, second);
        assert_eq!(lifecycle.pending_attempt(), Some(second));
        assert!(!lifecycle.complete_connect(first, true));
        assert!(!lifecycle.fail_connect(first));
        assert_eq!(lifecycle.state(), SessionState::Connecting);

        assert!(lifecycle.complete_connect(second, true));
        assert_eq!(lifecycle.pending_attempt(), None);
    }

    #[test]
    fn test_disconnect_from_connected_clears_mic() {
        let mut lifecycle = SessionLifecycle::new();
        let attempt = lifecycle.begin_connect().unwrap();
        lifecycle.complete_connect(attempt, true);

        assert!(lifecycle.disconnect());
        assert_eq!(lifecycle.state(), SessionState::Disconnected);
        assert!(!lifecycle.mic_enabled());
        assert!(!lifecycle.disconnect());
    }

    #[test]
    fn test_mic_toggle_requires_session() {
        let mut lifecycle = SessionLifecycle::new();
        assert_eq!(lifecycle.set_mic_enabled(true), Err(LisaError::NotConnected));
        assert_eq!(lifecycle.mic_toggle_target(), Err(LisaError::NotConnected));

        lifecycle.begin_connect().unwrap();
        assert_eq!(lifecycle.set_mic_enabled(true), Err(LisaError::NotConnected));
        assert!(!lifecycle.mic_enabled());
    }

    #[test]
    fn test_mic_toggles_repeatedly_while_connected() {
        let mut lifecycle = SessionLifecycle::new();
        let attempt = lifecycle.begin_connect().unwrap();
        lifecycle.complete_connect(attempt, true);

        for _ in 0..5 {
            let target = lifecycle.mic_toggle_target().unwrap();
            lifecycle.set_mic_enabled(target).unwrap();
            assert_eq!(lifecycle.mic_enabled(), target);
            assert!(lifecycle.is_connected());
        }
    }
}

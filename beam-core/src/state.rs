//! Session lifecycle state machine shared by producer and consumer.
//!
//! Provides a `SessionState` enum that models one session's life from
//! idle to its terminal state, with validated transitions. Each
//! transition returns `true` only when it applied, which lets sessions
//! drive it through `watch::Sender::send_if_modified` without
//! publishing spurious changes.

// ── SessionState ─────────────────────────────────────────────────

/// The current phase of a streaming session.
///
/// ```text
///  Idle ──► Connecting ──► Streaming ──► Stopping ──► Stopped
///               │               │            ▲
///               ▼               ▼            │ (stop requested)
///             Failed ◄──────────┘            │
///               ▲                            │
///               └──────── any active state ──┘
/// ```
///
/// A session walks this machine exactly once: `Stopped` and `Failed`
/// are terminal, and a new stream means a new session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Session object exists; pipeline not yet scheduled.
    #[default]
    Idle,

    /// Establishing the TCP connection (dialing, or bound and waiting
    /// to accept).
    Connecting,

    /// Connection up; frames are flowing.
    Streaming,

    /// Stop requested; pipeline is winding down.
    Stopping,

    /// Terminal: the session ended cleanly (stop request or peer close
    /// at a frame boundary).
    Stopped,

    /// Terminal: the pipeline died on an error.
    Failed {
        /// Human-readable cause, from the underlying `BeamError`.
        reason: String,
    },
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Stopping => write!(f, "Stopping"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed { reason } => write!(f, "Failed: {reason}"),
        }
    }
}

impl SessionState {
    /// Returns `true` while the pipeline is alive (connecting,
    /// streaming, or winding down).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming | Self::Stopping)
    }

    /// Returns `true` once the session can never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed { .. })
    }

    /// The failure cause, for `Failed` only.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────
    //
    // Each returns `true` when the transition applied and `false`
    // when the current state does not permit it.

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`.
    pub fn begin_connect(&mut self) -> bool {
        match self {
            Self::Idle => {
                *self = Self::Connecting;
                true
            }
            _ => false,
        }
    }

    /// Transition to `Streaming`.
    ///
    /// Valid from: `Connecting`.
    pub fn begin_streaming(&mut self) -> bool {
        match self {
            Self::Connecting => {
                *self = Self::Streaming;
                true
            }
            _ => false,
        }
    }

    /// Transition to `Stopping`.
    ///
    /// Valid from: `Connecting`, `Streaming`. A stop request on an
    /// idle or already-terminal session is a no-op.
    pub fn request_stop(&mut self) -> bool {
        match self {
            Self::Connecting | Self::Streaming => {
                *self = Self::Stopping;
                true
            }
            _ => false,
        }
    }

    /// Transition to `Stopped`.
    ///
    /// Valid from: `Idle`, `Connecting`, `Streaming`, `Stopping`;
    /// wherever the pipeline was when it wound down cleanly. Terminal
    /// states stay put.
    pub fn finish_stop(&mut self) -> bool {
        match self {
            Self::Idle | Self::Connecting | Self::Streaming | Self::Stopping => {
                *self = Self::Stopped;
                true
            }
            _ => false,
        }
    }

    /// Transition to `Failed`.
    ///
    /// Valid from: any non-terminal state. A session that already
    /// stopped or failed keeps its original outcome.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = Self::Failed {
            reason: reason.into(),
        };
        true
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut state = SessionState::default();
        assert_eq!(state, SessionState::Idle);
        assert!(!state.is_active());

        assert!(state.begin_connect());
        assert_eq!(state, SessionState::Connecting);
        assert!(state.is_active());

        assert!(state.begin_streaming());
        assert_eq!(state, SessionState::Streaming);

        assert!(state.request_stop());
        assert_eq!(state, SessionState::Stopping);
        assert!(state.is_active());

        assert!(state.finish_stop());
        assert_eq!(state, SessionState::Stopped);
        assert!(state.is_terminal());
    }

    #[test]
    fn clean_peer_close_skips_stopping() {
        let mut state = SessionState::Streaming;
        assert!(state.finish_stop());
        assert_eq!(state, SessionState::Stopped);
    }

    #[test]
    fn connect_only_from_idle() {
        let mut state = SessionState::Streaming;
        assert!(!state.begin_connect());
        assert_eq!(state, SessionState::Streaming);
    }

    #[test]
    fn streaming_only_from_connecting() {
        let mut state = SessionState::Idle;
        assert!(!state.begin_streaming());
        assert_eq!(state, SessionState::Idle);

        let mut state = SessionState::Stopping;
        assert!(!state.begin_streaming());
        assert_eq!(state, SessionState::Stopping);
    }

    #[test]
    fn stop_request_is_noop_when_idle_or_terminal() {
        let mut state = SessionState::Idle;
        assert!(!state.request_stop());
        assert_eq!(state, SessionState::Idle);

        let mut state = SessionState::Stopped;
        assert!(!state.request_stop());
        assert_eq!(state, SessionState::Stopped);
    }

    #[test]
    fn repeated_stop_changes_nothing() {
        let mut state = SessionState::Streaming;
        assert!(state.request_stop());
        assert!(!state.request_stop());
        assert!(state.finish_stop());
        assert!(!state.finish_stop());
        assert_eq!(state, SessionState::Stopped);
    }

    #[test]
    fn failure_from_any_active_state() {
        for start in [
            SessionState::Idle,
            SessionState::Connecting,
            SessionState::Streaming,
            SessionState::Stopping,
        ] {
            let mut state = start;
            assert!(state.fail("boom"));
            assert_eq!(state.failure_reason(), Some("boom"));
            assert!(state.is_terminal());
        }
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut state = SessionState::Stopped;
        assert!(!state.fail("late error"));
        assert_eq!(state, SessionState::Stopped);

        let mut state = SessionState::Failed {
            reason: "first".into(),
        };
        assert!(!state.fail("second"));
        assert!(!state.finish_stop());
        assert_eq!(state.failure_reason(), Some("first"));
    }

    #[test]
    fn display_format() {
        assert_eq!(SessionState::Idle.to_string(), "Idle");
        assert_eq!(SessionState::Streaming.to_string(), "Streaming");
        assert_eq!(
            SessionState::Failed {
                reason: "connection error: broken pipe".into()
            }
            .to_string(),
            "Failed: connection error: broken pipe"
        );
    }
}

//! Presentation events
//!
//! The controller never renders anything itself. It publishes UI
//! events on a channel and whatever front end is attached (terminal,
//! web view, test harness) draws them.

use std::fmt;

use lisa_gesture::GestureSymbol;
use tokio::sync::mpsc;

use crate::SessionSnapshot;

/// Log line origin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogKind {
    System,
    User,
    Agent,
    Error,
}

impl LogKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::System => "system",
            LogKind::User => "user",
            LogKind::Agent => "agent",
            LogKind::Error => "error",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UiEvent {
    /// Append a line to the conversation log
    Log { kind: LogKind, text: String },
    /// A gesture passed the gate
    GestureResult(GestureSymbol),
    /// Connection or microphone state changed
    SessionChanged(SessionSnapshot),
    /// Whether the remote side is currently speaking
    Speaking(bool),
}

impl UiEvent {
    pub fn log(kind: LogKind, text: impl Into<String>) -> Self {
        UiEvent::Log {
            kind,
            text: text.into(),
        }
    }
}

/// Text for the speaking indicator
pub fn speaking_label(speaking: bool) -> &'static str {
    if speaking {
        "Agent speaking"
    } else {
        "Listening"
    }
}

pub type UiSender = mpsc::UnboundedSender<UiEvent>;
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;

pub fn ui_channel() -> (UiSender, UiReceiver) {
    mpsc::unbounded_channel()
}

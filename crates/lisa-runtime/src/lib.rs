//! LISA Runtime - The interaction controller
//!
//! One controller per session owns:
//! 1. An emission gate (gesture rate limiting)
//! 2. The session lifecycle (connection + microphone state)
//! 3. The channel dispatcher (outbound chat/gesture, inbound routing)
//!
//! Video frames, chat input, user actions and transport callbacks all
//! arrive on one queue and are handled one at a time by `run`.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod lifecycle;
pub mod observability;
pub mod ui;

pub use config::*;
pub use controller::*;
pub use dispatcher::*;
pub use lifecycle::*;
pub use observability::*;
pub use ui::*;

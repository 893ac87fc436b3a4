//! LISA Core - Fundamental types shared by every bridge crate
//!
//! This crate defines:
//! - Session-local time (Timestamp, SessionClock)
//! - Channel topics and message shapes (Topic, OutboundMessage, InboundEvent)
//! - The error type used across the workspace

pub mod error;
pub mod message;
pub mod time;

pub use error::*;
pub use message::*;
pub use time::*;

//! LISA Transport - The room/session seam
//!
//! This crate provides:
//! - The `RoomTransport` trait the runtime drives
//! - Session token acquisition (`POST /token`)
//! - An in-process loopback transport
//! - A UDP room transport speaking `lisa-wire` datagrams

pub mod loopback;
pub mod room;
pub mod token;
pub mod udp;

pub use loopback::{LoopbackAgent, LoopbackTransport};
pub use room::*;
pub use token::*;
pub use udp::{UdpRoomTransport, UdpTransportOptions};

//! LISA Wire - Datagram format for the UDP room transport
//!
//! Every datagram is:
//! - Byte 0: magic `b'L'`
//! - Byte 1: wire version
//! - Byte 2: packet kind
//! - Body: kind-specific fields, strings as u16-LE length + UTF-8
//!
//! `Data` carries a u32-LE sequence number that the receiver echoes
//! back in an `Ack`.

pub mod packet;

pub use packet::*;

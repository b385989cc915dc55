//! # gpsbridge-protocol
//!
//! Message format for WebSocket subscribers.
//!
//! The server pushes one JSON text frame per location. There is no
//! client-to-server message protocol.

pub mod codec;

pub use codec::*;

//! # gpsbridge-providers
//!
//! Data providers for the GPS bridge.
//!
//! This crate turns a serial GPS receiver into validated locations:
//! - NMEA 0183 coordinate conversion
//! - GGA sentence parsing and fix validation
//! - Serial port opening
//! - Header pin muxing before the port is opened

pub mod coord;
pub mod nmea;
pub mod pins;
pub mod serial;

pub use coord::to_decimal_degrees;
pub use nmea::{parse_sentence, GgaParser, SentenceError, DEFAULT_GGA_TAG};
pub use pins::{configure_pins, PinError};
pub use serial::{open_serial, SerialError};

//! # gpsbridge-core
//!
//! Core data model and location store for the GPS bridge.
//!
//! This crate provides:
//! - Data model types (Location, Hemisphere, FixQuality)
//! - The single-slot location store
//! - Bridge configuration types and loader
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so the parsing and state logic can be tested without a runtime.

pub mod config;
pub mod model;
pub mod store;

pub use config::{BridgeConfig, ConfigError};
pub use model::*;
pub use store::{LocationStore, MemoryLocationStore};

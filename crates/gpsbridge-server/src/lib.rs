//! # gpsbridge-server
//!
//! The running half of the GPS bridge:
//! - `hub` - subscriber registry, late-join replay and broadcast
//! - `ingest` - serial lines to published locations
//! - `telemetry` - periodic upload of the current location
//! - `server` - HTTP(S) listener serving the index page and the WebSocket stream
//! - `tls` - certificate loading

pub mod hub;
pub mod ingest;
pub mod server;
pub mod telemetry;
pub mod tls;

pub use gpsbridge_core::{Location, LocationStore, MemoryLocationStore};
pub use hub::{shared_store, BroadcastHub, BroadcastReport, SharedStore, SubscriberId};
pub use ingest::{run_ingest, IngestStats};
pub use server::{BridgeServer, ServerConfig, ServerError};
pub use telemetry::{TelemetryUploader, UploadError, UploadOutcome};
pub use tls::{load_tls_acceptor, TlsError};

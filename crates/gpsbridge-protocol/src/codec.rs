//! WebSocket message codec for location frames.
//!
//! Each frame is a UTF-8 JSON object with exactly two numeric fields:
//!
//! ```json
//! {"latitude":48.1173,"longitude":11.516666666666667}
//! ```

use gpsbridge_core::Location;
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization or parsing failed.
    #[error("Failed to process location message: {0}")]
    Json(#[from] serde_json::Error),

    /// A coordinate is NaN or infinite and has no JSON representation.
    #[error("Location has a non-finite coordinate: {0}")]
    NonFinite(Location),
}

/// Encode a location to a JSON string for WebSocket transmission.
pub fn encode_location(location: &Location) -> Result<String, CodecError> {
    if !location.latitude.is_finite() || !location.longitude.is_finite() {
        return Err(CodecError::NonFinite(*location));
    }
    serde_json::to_string(location).map_err(CodecError::from)
}

/// Decode a location frame. Used by clients and tests.
pub fn decode_location(text: &str) -> Result<Location, CodecError> {
    serde_json::from_str(text).map_err(CodecError::from)
}

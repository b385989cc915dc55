//! GPS bridge data model types.
//!
//! These types describe what the bridge moves around:
//! - `Location`, the validated position fanned out to consumers
//! - `Hemisphere`, the sign carrier of an NMEA coordinate
//! - `FixQuality`, the fix indicator of a GGA sentence

use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated position fix in signed decimal degrees.
///
/// Locations are immutable values: every accepted sentence produces a new one
/// that supersedes the previous. Serialized as
/// `{"latitude":..,"longitude":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude, negative south of the equator.
    pub latitude: f64,
    /// Longitude, negative west of the prime meridian.
    pub longitude: f64,
}

impl Location {
    /// Create a new location.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are exactly zero.
    ///
    /// The coordinate converter reports malformed input as `0.0`, so a
    /// zero-zero pair cannot be told apart from a failed conversion.
    pub fn is_null_island(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Hemisphere letter attached to an NMEA coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parse an NMEA hemisphere letter (`N`, `S`, `E`, `W`).
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "N" => Some(Hemisphere::North),
            "S" => Some(Hemisphere::South),
            "E" => Some(Hemisphere::East),
            "W" => Some(Hemisphere::West),
            _ => None,
        }
    }

    /// Southern and western coordinates are negative.
    pub fn is_negative(&self) -> bool {
        matches!(self, Hemisphere::South | Hemisphere::West)
    }
}

/// GGA fix quality indicator (field 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    /// `0` - no fix, the position fields must not be used.
    Invalid,
    /// `1` - standalone GPS fix.
    Gps,
    /// `2` - differential GPS fix.
    Dgps,
    /// `3` - PPS fix.
    Pps,
    /// `4` - RTK with fixed integers.
    RtkFixed,
    /// `5` - RTK with float integers.
    RtkFloat,
    /// `6` - dead reckoning.
    Estimated,
    /// `7` - manual input.
    Manual,
    /// `8` - simulation mode.
    Simulation,
    /// Receiver-specific indicator above 8.
    Other(u8),
}

impl FixQuality {
    /// Decode the numeric indicator.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => FixQuality::Invalid,
            1 => FixQuality::Gps,
            2 => FixQuality::Dgps,
            3 => FixQuality::Pps,
            4 => FixQuality::RtkFixed,
            5 => FixQuality::RtkFloat,
            6 => FixQuality::Estimated,
            7 => FixQuality::Manual,
            8 => FixQuality::Simulation,
            other => FixQuality::Other(other),
        }
    }

    /// Parse the raw field text. Returns `None` if it is not a number.
    pub fn from_field(field: &str) -> Option<Self> {
        field.trim().parse::<u8>().ok().map(Self::from_code)
    }

    /// Whether a position can be derived from a sentence with this indicator.
    pub fn is_valid(&self) -> bool {
        !matches!(self, FixQuality::Invalid)
    }
}

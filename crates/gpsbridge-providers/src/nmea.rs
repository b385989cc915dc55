//! NMEA 0183 sentence parsing.
//!
//! Only GGA (global positioning fix data) sentences carry positions the bridge
//! uses. The relevant fields are:
//!
//! | index | content                     |
//! |-------|-----------------------------|
//! | 0     | tag, e.g. `$GNGGA`          |
//! | 2 / 3 | latitude / `N` or `S`       |
//! | 4 / 5 | longitude / `E` or `W`      |
//! | 6     | fix quality, `0` = no fix   |

use gpsbridge_core::{FixQuality, Hemisphere, Location};
use thiserror::Error;

use crate::coord::to_decimal_degrees;

/// Minimum number of fields a GGA sentence needs to reach the fix quality.
pub const MIN_GGA_FIELDS: usize = 7;

/// Tag of the GGA sentence used by default: the combined multi-constellation
/// solution. Receivers also emit per-constellation `$GPGGA` and friends for
/// the same epoch.
pub const DEFAULT_GGA_TAG: &str = "$GNGGA";

/// Reasons a GGA sentence does not produce a location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentenceError {
    #[error("GGA sentence has {count} fields, need at least 7")]
    TooFewFields { count: usize },

    #[error("GGA sentence has an empty fix quality field")]
    MissingFixQuality,

    #[error("GGA fix quality {0:?} is not a number")]
    InvalidFixQuality(String),

    #[error("GGA sentence reports no fix")]
    NoFix,

    #[error("GGA sentence has incomplete coordinates")]
    IncompleteCoordinates,

    #[error("Unknown hemisphere letter {0:?}")]
    InvalidHemisphere(String),

    /// Both coordinates converted to zero. This is how conversion failures
    /// surface, so a genuine fix at 0,0 is dropped as well.
    #[error("Coordinates converted to 0,0")]
    ZeroCoordinates,
}

/// A raw sentence split into its comma-separated fields.
///
/// Borrowed from the input line, lives for a single parse.
#[derive(Debug, Clone)]
pub struct Sentence<'a> {
    fields: Vec<&'a str>,
}

impl<'a> Sentence<'a> {
    pub fn split(raw: &'a str) -> Self {
        Self {
            fields: raw.split(',').collect(),
        }
    }

    /// The leading tag, e.g. `$GNGGA`.
    pub fn tag(&self) -> &'a str {
        self.fields.first().copied().unwrap_or_default()
    }

    pub fn field(&self, index: usize) -> Option<&'a str> {
        self.fields.get(index).copied()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Extracts locations from the one GGA sentence tag the bridge listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GgaParser {
    tag: String,
}

impl GgaParser {
    /// Accept only sentences tagged exactly `tag`, e.g. `$GPGGA`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Parse one line from the receiver.
    ///
    /// Returns `Ok(None)` for any other sentence, `Ok(Some(_))` for an
    /// accepted fix and `Err(_)` for a matching sentence that fails
    /// validation.
    pub fn parse(&self, line: &str) -> Result<Option<Location>, SentenceError> {
        let sentence = Sentence::split(line.trim());
        if sentence.tag() != self.tag {
            return Ok(None);
        }
        parse_gga(&sentence).map(Some)
    }
}

impl Default for GgaParser {
    fn default() -> Self {
        Self::new(DEFAULT_GGA_TAG)
    }
}

/// Parse one line with the default `$GNGGA` filter.
pub fn parse_sentence(line: &str) -> Result<Option<Location>, SentenceError> {
    GgaParser::default().parse(line)
}

fn parse_gga(sentence: &Sentence<'_>) -> Result<Location, SentenceError> {
    if sentence.field_count() < MIN_GGA_FIELDS {
        return Err(SentenceError::TooFewFields {
            count: sentence.field_count(),
        });
    }

    let quality_field = sentence.field(6).unwrap_or_default();
    if quality_field.is_empty() {
        return Err(SentenceError::MissingFixQuality);
    }
    let quality = FixQuality::from_field(quality_field)
        .ok_or_else(|| SentenceError::InvalidFixQuality(quality_field.to_string()))?;
    if !quality.is_valid() {
        return Err(SentenceError::NoFix);
    }

    let (lat, lat_dir, lon, lon_dir) = match (
        sentence.field(2),
        sentence.field(3),
        sentence.field(4),
        sentence.field(5),
    ) {
        (Some(lat), Some(lat_dir), Some(lon), Some(lon_dir))
            if !lat.is_empty() && !lat_dir.is_empty() && !lon.is_empty() && !lon_dir.is_empty() =>
        {
            (lat, lat_dir, lon, lon_dir)
        }
        _ => return Err(SentenceError::IncompleteCoordinates),
    };

    let lat_hemisphere = hemisphere(lat_dir, &[Hemisphere::North, Hemisphere::South])?;
    let lon_hemisphere = hemisphere(lon_dir, &[Hemisphere::East, Hemisphere::West])?;

    let location = Location::new(
        to_decimal_degrees(lat, lat_hemisphere),
        to_decimal_degrees(lon, lon_hemisphere),
    );

    if location.is_null_island() {
        return Err(SentenceError::ZeroCoordinates);
    }

    Ok(location)
}

fn hemisphere(letter: &str, allowed: &[Hemisphere]) -> Result<Hemisphere, SentenceError> {
    Hemisphere::from_letter(letter)
        .filter(|h| allowed.contains(h))
        .ok_or_else(|| SentenceError::InvalidHemisphere(letter.to_string()))
}

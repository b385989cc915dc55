//! NMEA coordinate conversion.
//!
//! NMEA 0183 encodes positions as degrees and decimal minutes: `DDMM.MMMM`
//! for latitude and `DDDMM.MMMM` for longitude, with the sign carried by a
//! separate hemisphere letter.

use gpsbridge_core::Hemisphere;
use tracing::warn;

/// Value returned for any coordinate that cannot be converted.
pub const CONVERSION_SENTINEL: f64 = 0.0;

/// Convert an NMEA degrees-minutes string to signed decimal degrees.
///
/// The degree width is taken from the number of digits before the decimal
/// point: four digits is `DDMM`, five is `DDDMM`. Malformed input yields
/// [`CONVERSION_SENTINEL`] instead of an error.
pub fn to_decimal_degrees(coord: &str, hemisphere: Hemisphere) -> f64 {
    let Some((degrees, minutes)) = split_degrees_minutes(coord) else {
        return CONVERSION_SENTINEL;
    };

    let decimal = degrees + minutes / 60.0;
    if hemisphere.is_negative() {
        -decimal
    } else {
        decimal
    }
}

fn split_degrees_minutes(coord: &str) -> Option<(f64, f64)> {
    // Digits and a single point only: `f64::from_str` would also take signs,
    // exponents and `inf`.
    let digits_and_point = coord.bytes().all(|b| b.is_ascii_digit() || b == b'.');
    if coord.len() < 4 || !digits_and_point {
        warn!("Invalid NMEA coordinate received: {:?}", coord);
        return None;
    }

    let Some(point) = coord.find('.') else {
        warn!("No decimal point in NMEA coordinate: {:?}", coord);
        return None;
    };
    if coord[point + 1..].contains('.') {
        warn!("Invalid NMEA coordinate received: {:?}", coord);
        return None;
    }

    let integer_part = &coord[..point];
    let degree_digits = match integer_part.len() {
        4 => 2,
        5 => 3,
        _ => {
            warn!("Unexpected NMEA coordinate format: {:?}", coord);
            return None;
        }
    };

    match (
        coord[..degree_digits].parse::<f64>(),
        coord[degree_digits..].parse::<f64>(),
    ) {
        (Ok(degrees), Ok(minutes)) if degrees.is_finite() && minutes.is_finite() => {
            Some((degrees, minutes))
        }
        _ => {
            warn!("Failed to split degrees and minutes: {:?}", coord);
            None
        }
    }
}

//! Encoded polyline codec
//!
//! Implements the fixed-point delta encoding used by the directions API for
//! route geometry. Coordinates are scaled by 1e5, delta-encoded against the
//! previous point, zig-zag signed and emitted as little-endian 5-bit groups
//! offset by 63. Bit `0x20` marks a continuation group.

use crate::geo::LatLng;
use crate::{Error, Result};

/// Fixed-point scale factor (five decimal places)
const PRECISION: f64 = 1e5;

/// ASCII offset applied to every emitted group
const CHAR_OFFSET: u8 = 63;

/// Continuation bit within a 6-bit group
const CONTINUATION: i64 = 0x20;

/// Payload mask within a 6-bit group
const CHUNK_MASK: i64 = 0x1f;

/// Largest shift before a value overflows the 32-bit range the format allows
const MAX_SHIFT: u32 = 30;

/// Decode an encoded polyline into coordinates
///
/// # Errors
///
/// Returns error if the input contains characters outside the encoding
/// alphabet, ends in the middle of a value, or has a latitude without its
/// longitude.
pub fn decode(encoded: &str) -> Result<Vec<LatLng>> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::with_capacity(bytes.len() / 4);
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        lat += next_value(bytes, &mut index)?;

        if index >= bytes.len() {
            return Err(Error::Polyline(format!(
                "latitude without longitude at offset {index}"
            )));
        }
        lng += next_value(bytes, &mut index)?;

        #[allow(clippy::cast_precision_loss)]
        points.push(LatLng::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    Ok(points)
}

/// Read one zig-zag encoded delta starting at `*index`
fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(Error::Polyline(format!(
                "unterminated value at offset {index}"
            )));
        };
        if !(CHAR_OFFSET..=CHAR_OFFSET + 63).contains(&byte) {
            return Err(Error::Polyline(format!(
                "invalid character {:?} at offset {index}",
                byte as char
            )));
        }
        *index += 1;

        let group = i64::from(byte - CHAR_OFFSET);
        result |= (group & CHUNK_MASK) << shift;
        shift += 5;

        if group < CONTINUATION {
            break;
        }
        if shift > MAX_SHIFT {
            return Err(Error::Polyline(format!(
                "value too long at offset {index}"
            )));
        }
    }

    // Odd results are negative: invert the shifted value
    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode coordinates into a polyline string
///
/// Coordinates are rounded to five decimal places.
#[must_use]
pub fn encode(points: &[LatLng]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = to_fixed(point.lat);
        let lng = to_fixed(point.lng);

        push_value(&mut out, lat - prev_lat);
        push_value(&mut out, lng - prev_lng);

        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

#[allow(clippy::cast_possible_truncation)]
fn to_fixed(degrees: f64) -> i64 {
    (degrees * PRECISION).round() as i64
}

/// `value` is non-negative after zig-zag folding and each emitted group is below 64
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn push_value(out: &mut String, delta: i64) {
    let mut value = delta << 1;
    if delta < 0 {
        value = !value;
    }

    while value >= CONTINUATION {
        let group = (CONTINUATION | (value & CHUNK_MASK)) as u8;
        out.push(char::from(group + CHAR_OFFSET));
        value >>= 5;
    }
    out.push(char::from(value as u8 + CHAR_OFFSET));
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn assert_close(actual: &LatLng, lat: f64, lng: f64) {
        assert!(
            (actual.lat - lat).abs() < 1e-5 && (actual.lng - lng).abs() < 1e-5,
            "expected ({lat}, {lng}), got {actual}"
        );
    }

    #[test]
    fn decodes_canonical_vector() {
        let points = decode(CANONICAL).unwrap();

        assert_eq!(points.len(), 3);
        assert_close(&points[0], 38.5, -120.2);
        assert_close(&points[1], 40.7, -120.95);
        assert_close(&points[2], 43.252, -126.453);
    }

    #[test]
    fn encodes_canonical_vector() {
        let points = vec![
            LatLng::new(38.5, -120.2),
            LatLng::new(40.7, -120.95),
            LatLng::new(43.252, -126.453),
        ];
        assert_eq!(encode(&points), CANONICAL);
    }

    #[test]
    fn reencoding_preserves_coordinates() {
        let points = decode(CANONICAL).unwrap();
        let again = decode(&encode(&points)).unwrap();

        assert_eq!(points.len(), again.len());
        for (a, b) in points.iter().zip(&again) {
            assert_close(b, a.lat, a.lng);
        }
    }

    #[test]
    fn empty_input_is_empty_route() {
        assert!(decode("").unwrap().is_empty());
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn single_zero_point() {
        let points = decode("??").unwrap();
        assert_eq!(points, vec![LatLng::new(0.0, 0.0)]);
    }

    #[test]
    fn truncated_input_is_an_error() {
        // Latitude group present, longitude missing
        assert!(decode("_p~iF").is_err());
        // Continuation bit set on the final character
        assert!(decode("_p~iF~ps|").is_err());
    }

    #[test]
    fn invalid_character_is_an_error() {
        assert!(decode("_p~iF ps|U").is_err());
    }
}

//! Datagram frame decoding.
//!
//! A sensor sends one reading per UDP datagram as a bare text line:
//!
//! ```text
//! <current_amps>,<power_watts>
//! ```
//!
//! There is no length prefix, checksum or sequence number. Whitespace around
//! the line and around each field is ignored so senders that append a newline
//! still decode.

use crate::error::DecodeError;

/// One uncalibrated sample exactly as the sensor reported it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// RMS current in amps.
    pub current: f64,
    /// Apparent power in watts.
    pub power: f64,
}

/// Decode a datagram payload into a [`RawReading`].
pub fn decode(payload: &[u8]) -> Result<RawReading, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
    let fields: Vec<&str> = text.trim().split(',').collect();
    if fields.len() != 2 {
        return Err(DecodeError::FieldCount(fields.len()));
    }

    Ok(RawReading {
        current: parse_field("current", fields[0])?,
        power: parse_field("power", fields[1])?,
    })
}

fn parse_field(field: &'static str, raw: &str) -> Result<f64, DecodeError> {
    let value = raw.trim();
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(DecodeError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sensor_line() {
        let r = decode(b"1.234,283.82").unwrap();
        assert_eq!(r.current, 1.234);
        assert_eq!(r.power, 283.82);
    }

    #[test]
    fn test_decode_trims_whitespace_and_newline() {
        let r = decode(b" 0.500 , 115.00\r\n").unwrap();
        assert_eq!(r.current, 0.5);
        assert_eq!(r.power, 115.0);
    }

    #[test]
    fn test_decode_negative_values_pass_through() {
        // Sign handling belongs to calibration, not decoding.
        let r = decode(b"-0.1,-23").unwrap();
        assert_eq!(r.current, -0.1);
        assert_eq!(r.power, -23.0);
    }

    #[test]
    fn test_decode_rejects_non_numeric() {
        let err = decode(b"abc,def").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidNumber {
                field: "current",
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_decode_rejects_bad_power_field() {
        let err = decode(b"1.0,watts").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidNumber { field: "power", .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        assert_eq!(decode(b"1.0").unwrap_err(), DecodeError::FieldCount(1));
        assert_eq!(decode(b"1.0,2.0,3.0").unwrap_err(), DecodeError::FieldCount(3));
        assert_eq!(decode(b"").unwrap_err(), DecodeError::FieldCount(1));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert_eq!(decode(&[0xff, 0xfe, b',', b'1']).unwrap_err(), DecodeError::InvalidUtf8);
    }

    #[test]
    fn test_decode_rejects_non_finite() {
        assert!(decode(b"NaN,1.0").is_err());
        assert!(decode(b"1.0,inf").is_err());
        assert!(decode(b"1.0,").is_err());
    }
}

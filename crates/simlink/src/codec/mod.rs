// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed value codec.
//!
//! Decodes a field at a known offset of an untagged payload into a
//! [`SimValue`] of the requested [`HostType`], and encodes values back for
//! outbound writes. All numbers are little-endian.
//!
//! Conversions allowed besides the natural mapping of each data type:
//! - `Float64` may be read as `f32` (narrowed on decode, widened on encode);
//! - `Int32` may be read as `bool` (nonzero test).
//!
//! Anything else fails with [`SimError::UnsupportedConversion`].

mod value;

pub use value::{LatLonAlt, SimType, SimValue, Xyz};

use crate::error::{Result, SimError};
use crate::layout;
use crate::schema::{DataType, HostType};

/// Check whether a field of `data_type` can be read or written as `host`.
pub fn is_convertible(data_type: DataType, host: HostType) -> bool {
    if data_type.natural_host() == Some(host) {
        return true;
    }
    matches!(
        (data_type, host),
        (DataType::Float64, HostType::F32) | (DataType::Int32, HostType::Bool)
    )
}

/// Check whether `host` is the exact in-memory representation of `data_type`.
///
/// Compound layouts require this: the field occupies exactly the declared
/// width, so no narrowing is accepted.
pub fn is_exact(data_type: DataType, host: HostType) -> bool {
    data_type.natural_host() == Some(host) || (data_type, host) == (DataType::Int32, HostType::Bool)
}

fn region(buf: &[u8], offset: usize, size: usize) -> Result<&[u8]> {
    let need = offset.saturating_add(size);
    buf.get(offset..need).ok_or(SimError::Truncated {
        need,
        have: buf.len(),
    })
}

fn read_f64(bytes: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    f64::from_le_bytes(raw)
}

/// Decode the datum of `data_type` at `offset` as `host`.
pub fn decode(buf: &[u8], offset: usize, data_type: DataType, host: HostType) -> Result<SimValue> {
    let size = layout::size_of(data_type)?;
    if !is_convertible(data_type, host) {
        return Err(SimError::UnsupportedConversion { data_type, host });
    }
    let bytes = region(buf, offset, size)?;

    let value = match (data_type, host) {
        (DataType::Int32, HostType::I32) => SimValue::I32(i32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])),
        (DataType::Int32, HostType::Bool) => {
            SimValue::Bool(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) != 0)
        }
        (DataType::Int64, HostType::I64) => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(bytes);
            SimValue::I64(i64::from_le_bytes(raw))
        }
        (DataType::Float32, HostType::F32) => SimValue::F32(f32::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])),
        (DataType::Float64, HostType::F64) => SimValue::F64(read_f64(bytes, 0)),
        (DataType::Float64, HostType::F32) => SimValue::F32(read_f64(bytes, 0) as f32),
        (DataType::FixedString(_), HostType::String) => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            SimValue::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        (DataType::LatLonAlt, HostType::LatLonAlt) => SimValue::LatLonAlt(LatLonAlt {
            latitude: read_f64(bytes, 0),
            longitude: read_f64(bytes, 8),
            altitude: read_f64(bytes, 16),
        }),
        (DataType::Xyz, HostType::Xyz) => SimValue::Xyz(Xyz {
            x: read_f64(bytes, 0),
            y: read_f64(bytes, 8),
            z: read_f64(bytes, 16),
        }),
        _ => return Err(SimError::UnsupportedConversion { data_type, host }),
    };
    Ok(value)
}

/// Encode `value` as a datum of `data_type`.
pub fn encode(value: &SimValue, data_type: DataType) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(layout::size_of(data_type)?);
    encode_into(value, data_type, &mut out)?;
    Ok(out)
}

/// Append the encoding of `value` to `out`.
pub fn encode_into(value: &SimValue, data_type: DataType, out: &mut Vec<u8>) -> Result<()> {
    let size = layout::size_of(data_type)?;
    let host = value.host_type();
    if !is_convertible(data_type, host) {
        return Err(SimError::UnsupportedConversion { data_type, host });
    }
    let start = out.len();

    match (value, data_type) {
        (SimValue::I32(v), DataType::Int32) => out.extend_from_slice(&v.to_le_bytes()),
        (SimValue::Bool(v), DataType::Int32) => out.extend_from_slice(&i32::from(*v).to_le_bytes()),
        (SimValue::I64(v), DataType::Int64) => out.extend_from_slice(&v.to_le_bytes()),
        (SimValue::F32(v), DataType::Float32) => out.extend_from_slice(&v.to_le_bytes()),
        (SimValue::F64(v), DataType::Float64) => out.extend_from_slice(&v.to_le_bytes()),
        (SimValue::F32(v), DataType::Float64) => {
            out.extend_from_slice(&f64::from(*v).to_le_bytes());
        }
        (SimValue::String(s), DataType::FixedString(width)) => {
            let bytes = s.as_bytes();
            if bytes.len() > width {
                return Err(SimError::StringTooLong {
                    len: bytes.len(),
                    max: width,
                });
            }
            out.extend_from_slice(bytes);
            out.resize(out.len() + (width - bytes.len()), 0);
        }
        (SimValue::LatLonAlt(v), DataType::LatLonAlt) => {
            for component in [v.latitude, v.longitude, v.altitude] {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        (SimValue::Xyz(v), DataType::Xyz) => {
            for component in [v.x, v.y, v.z] {
                out.extend_from_slice(&component.to_le_bytes());
            }
        }
        _ => return Err(SimError::UnsupportedConversion { data_type, host }),
    }
    debug_assert_eq!(out.len() - start, size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: SimValue, data_type: DataType, host: HostType) -> SimValue {
        let bytes = encode(&value, data_type).expect("encode");
        assert_eq!(bytes.len(), layout::size_of(data_type).unwrap());
        decode(&bytes, 0, data_type, host).expect("decode")
    }

    #[test]
    fn roundtrip_each_data_type() {
        let cases = [
            (SimValue::I32(-42), DataType::Int32, HostType::I32),
            (SimValue::Bool(true), DataType::Int32, HostType::Bool),
            (SimValue::I64(1 << 40), DataType::Int64, HostType::I64),
            (SimValue::F32(1.25), DataType::Float32, HostType::F32),
            (SimValue::F64(47.4502), DataType::Float64, HostType::F64),
            (SimValue::from("N172SP"), DataType::FixedString(32), HostType::String),
            (
                SimValue::LatLonAlt(LatLonAlt {
                    latitude: 47.45,
                    longitude: -122.31,
                    altitude: 132.0,
                }),
                DataType::LatLonAlt,
                HostType::LatLonAlt,
            ),
            (
                SimValue::Xyz(Xyz {
                    x: 1.0,
                    y: -2.0,
                    z: 3.5,
                }),
                DataType::Xyz,
                HostType::Xyz,
            ),
        ];
        for (value, data_type, host) in cases {
            assert_eq!(roundtrip(value.clone(), data_type, host), value);
        }
    }

    #[test]
    fn float64_narrows_to_f32() {
        let bytes = 3.141592653589793f64.to_le_bytes();
        let value = decode(&bytes, 0, DataType::Float64, HostType::F32).unwrap();
        assert_eq!(value, SimValue::F32(3.141592653589793f64 as f32));

        // Widening back through encode stays within f32 precision.
        let back = roundtrip(SimValue::F32(2.5), DataType::Float64, HostType::F32);
        assert_eq!(back, SimValue::F32(2.5));
    }

    #[test]
    fn int32_as_bool_is_nonzero_test() {
        let bytes = 7i32.to_le_bytes();
        assert_eq!(
            decode(&bytes, 0, DataType::Int32, HostType::Bool).unwrap(),
            SimValue::Bool(true)
        );
        let bytes = 0i32.to_le_bytes();
        assert_eq!(
            decode(&bytes, 0, DataType::Int32, HostType::Bool).unwrap(),
            SimValue::Bool(false)
        );
    }

    #[test]
    fn decode_at_offset() {
        let mut buf = vec![0xAAu8; 4];
        buf.extend_from_slice(&12.5f64.to_le_bytes());
        assert_eq!(
            decode(&buf, 4, DataType::Float64, HostType::F64).unwrap(),
            SimValue::F64(12.5)
        );
    }

    #[test]
    fn unsupported_conversions_fail() {
        let bytes = [0u8; 8];
        for (data_type, host) in [
            (DataType::Float32, HostType::F64),
            (DataType::Int64, HostType::I32),
            (DataType::Int32, HostType::F64),
            (DataType::Float64, HostType::String),
        ] {
            assert!(matches!(
                decode(&bytes, 0, data_type, host),
                Err(SimError::UnsupportedConversion { .. })
            ));
        }
        assert!(matches!(
            encode(&SimValue::F64(1.0), DataType::Float32),
            Err(SimError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn string_stops_at_terminator() {
        let mut buf = b"C172".to_vec();
        buf.push(0);
        buf.extend_from_slice(b"garbage");
        buf.resize(16, 0);
        assert_eq!(
            decode(&buf, 0, DataType::FixedString(16), HostType::String).unwrap(),
            SimValue::from("C172")
        );
    }

    #[test]
    fn unterminated_string_uses_full_width() {
        let buf = *b"ABCDEFGH";
        assert_eq!(
            decode(&buf, 0, DataType::FixedString(8), HostType::String).unwrap(),
            SimValue::from("ABCDEFGH")
        );
    }

    #[test]
    fn string_too_long_is_rejected() {
        let err = encode(&SimValue::from("TOO LONG FOR EIGHT"), DataType::FixedString(8))
            .unwrap_err();
        assert!(matches!(err, SimError::StringTooLong { len: 18, max: 8 }));
    }

    #[test]
    fn short_payload_is_truncated_error() {
        let buf = [0u8; 6];
        let err = decode(&buf, 0, DataType::Float64, HostType::F64).unwrap_err();
        assert!(matches!(err, SimError::Truncated { need: 8, have: 6 }));
    }

    #[test]
    fn variable_string_is_unsupported_type() {
        let buf = [0u8; 32];
        assert!(matches!(
            decode(&buf, 0, DataType::VariableString, HostType::String),
            Err(SimError::UnsupportedType(DataType::VariableString))
        ));
    }

    #[test]
    fn compound_requires_exact_representation() {
        assert!(is_exact(DataType::Float64, HostType::F64));
        assert!(is_exact(DataType::Int32, HostType::Bool));
        assert!(!is_exact(DataType::Float64, HostType::F32));
        assert!(is_convertible(DataType::Float64, HostType::F32));
    }
}

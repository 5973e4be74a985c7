// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded values and the Rust types they map to.

use crate::error::{Result, SimError};
use crate::schema::HostType;

/// Latitude (degrees), longitude (degrees), altitude (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatLonAlt {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Generic 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A value held in one of the Rust representations the codec produces.
#[derive(Debug, Clone, PartialEq)]
pub enum SimValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    LatLonAlt(LatLonAlt),
    Xyz(Xyz),
}

impl SimValue {
    /// Rust type held by this value.
    pub fn host_type(&self) -> HostType {
        match self {
            Self::Bool(_) => HostType::Bool,
            Self::I32(_) => HostType::I32,
            Self::I64(_) => HostType::I64,
            Self::F32(_) => HostType::F32,
            Self::F64(_) => HostType::F64,
            Self::String(_) => HostType::String,
            Self::LatLonAlt(_) => HostType::LatLonAlt,
            Self::Xyz(_) => HostType::Xyz,
        }
    }

    /// Try to get as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

/// Rust types that can be read from and written to simulator variables.
pub trait SimType: Sized + Send + 'static {
    /// Host representation requested from the codec.
    const HOST: HostType;

    /// Extract from a decoded value.
    fn from_value(value: SimValue) -> Result<Self>;

    /// Wrap for encoding.
    fn to_value(&self) -> SimValue;
}

macro_rules! impl_sim_type {
    ($ty:ty, $host:ident, $variant:ident) => {
        impl SimType for $ty {
            const HOST: HostType = HostType::$host;

            fn from_value(value: SimValue) -> Result<Self> {
                match value {
                    SimValue::$variant(v) => Ok(v),
                    other => Err(SimError::HostMismatch {
                        expected: HostType::$host,
                        found: other.host_type(),
                    }),
                }
            }

            fn to_value(&self) -> SimValue {
                SimValue::$variant(self.clone())
            }
        }

        impl From<$ty> for SimValue {
            fn from(v: $ty) -> Self {
                SimValue::$variant(v)
            }
        }
    };
}

impl_sim_type!(bool, Bool, Bool);
impl_sim_type!(i32, I32, I32);
impl_sim_type!(i64, I64, I64);
impl_sim_type!(f32, F32, F32);
impl_sim_type!(f64, F64, F64);
impl_sim_type!(String, String, String);
impl_sim_type!(LatLonAlt, LatLonAlt, LatLonAlt);
impl_sim_type!(Xyz, Xyz, Xyz);

impl From<&str> for SimValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

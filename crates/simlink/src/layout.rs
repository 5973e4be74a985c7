// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte layout of untagged, fixed-layout payloads.
//!
//! Fields are packed back to back in definition order with no padding, so a
//! field's offset is the sum of the sizes before it. Types without a fixed
//! native size are rejected with [`SimError::UnsupportedType`].

use crate::error::{Result, SimError};
use crate::schema::DataType;

/// Size of one LatLonAlt / Xyz structure (3 x f64).
pub const VEC3_SIZE: usize = 24;

/// Native byte size of one datum.
pub fn size_of(data_type: DataType) -> Result<usize> {
    match data_type {
        DataType::Int32 | DataType::Float32 => Ok(4),
        DataType::Int64 | DataType::Float64 => Ok(8),
        DataType::FixedString(0) => Err(SimError::UnsupportedType(data_type)),
        DataType::FixedString(len) => Ok(len),
        DataType::LatLonAlt | DataType::Xyz => Ok(VEC3_SIZE),
        DataType::VariableString
        | DataType::InitPosition
        | DataType::MarkerState
        | DataType::Waypoint => Err(SimError::UnsupportedType(data_type)),
    }
}

/// Cumulative offset of each datum.
pub fn offsets(types: &[DataType]) -> Result<Vec<usize>> {
    Ok(Layout::of(types)?.offsets)
}

/// Total payload size.
pub fn payload_size(types: &[DataType]) -> Result<usize> {
    Ok(Layout::of(types)?.size)
}

/// Offsets and total size of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub offsets: Vec<usize>,
    pub size: usize,
}

impl Layout {
    /// Compute the layout of `types` in order.
    pub fn of(types: &[DataType]) -> Result<Self> {
        let mut offsets = Vec::with_capacity(types.len());
        let mut size = 0usize;
        for &data_type in types {
            offsets.push(size);
            size = size
                .checked_add(size_of(data_type)?)
                .ok_or(SimError::UnsupportedType(data_type))?;
        }
        Ok(Self { offsets, size })
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field schemas and the process-wide schema registry.
//!
//! A [`FieldSchema`] describes one simulator variable: its symbolic name,
//! unit, abstract [`DataType`] and whether it may be written. The
//! [`SchemaRegistry`] maps names to schemas case-insensitively and ships
//! with a table of built-in aviation variables.
//!
//! # Example
//!
//! ```rust
//! use simlink::schema::{DataType, FieldSchema, SchemaRegistry};
//!
//! let registry = SchemaRegistry::with_builtins();
//! let lat = registry.get("plane latitude").expect("built-in");
//! assert_eq!(lat.data_type, DataType::Float64);
//!
//! registry.register(FieldSchema::new("MY CUSTOM VAR", "number", DataType::Int32));
//! assert!(registry.is_registered("my custom var"));
//! ```

mod builtins;
mod registry;

pub use registry::SchemaRegistry;

use std::fmt;

/// Abstract data types understood by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    /// Null-padded string of a fixed byte width.
    FixedString(usize),
    /// Variable-length string (no fixed layout).
    VariableString,
    /// Three `f64`: latitude, longitude, altitude.
    LatLonAlt,
    /// Three `f64`: x, y, z.
    Xyz,
    /// Native initial-position structure.
    InitPosition,
    /// Native marker-state structure.
    MarkerState,
    /// Native waypoint structure.
    Waypoint,
}

impl DataType {
    /// Width used for ad hoc string schemas.
    pub const DEFAULT_STRING_WIDTH: usize = 256;

    /// Rust type a field of this data type decodes to without conversion.
    pub fn natural_host(self) -> Option<HostType> {
        match self {
            Self::Int32 => Some(HostType::I32),
            Self::Int64 => Some(HostType::I64),
            Self::Float32 => Some(HostType::F32),
            Self::Float64 => Some(HostType::F64),
            Self::FixedString(_) | Self::VariableString => Some(HostType::String),
            Self::LatLonAlt => Some(HostType::LatLonAlt),
            Self::Xyz => Some(HostType::Xyz),
            Self::InitPosition | Self::MarkerState | Self::Waypoint => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32 => f.write_str("INT32"),
            Self::Int64 => f.write_str("INT64"),
            Self::Float32 => f.write_str("FLOAT32"),
            Self::Float64 => f.write_str("FLOAT64"),
            Self::FixedString(len) => write!(f, "STRING{}", len),
            Self::VariableString => f.write_str("STRINGV"),
            Self::LatLonAlt => f.write_str("LATLONALT"),
            Self::Xyz => f.write_str("XYZ"),
            Self::InitPosition => f.write_str("INITPOSITION"),
            Self::MarkerState => f.write_str("MARKERSTATE"),
            Self::Waypoint => f.write_str("WAYPOINT"),
        }
    }
}

/// Rust-side representation requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    Bool,
    I32,
    I64,
    F32,
    F64,
    String,
    LatLonAlt,
    Xyz,
}

impl HostType {
    /// Data type synthesized for a name absent from the registry.
    pub fn ad_hoc_data_type(self) -> DataType {
        match self {
            Self::Bool | Self::I32 => DataType::Int32,
            Self::I64 => DataType::Int64,
            Self::F32 => DataType::Float32,
            Self::F64 => DataType::Float64,
            Self::String => DataType::FixedString(DataType::DEFAULT_STRING_WIDTH),
            Self::LatLonAlt => DataType::LatLonAlt,
            Self::Xyz => DataType::Xyz,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "String",
            Self::LatLonAlt => "LatLonAlt",
            Self::Xyz => "Xyz",
        };
        f.write_str(name)
    }
}

/// Description of one simulator variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Symbolic name (matched case-insensitively).
    pub name: String,
    /// Default unit.
    pub unit: String,
    /// Abstract data type.
    pub data_type: DataType,
    /// Whether the variable may be written.
    pub settable: bool,
    /// Optional human description.
    pub description: Option<String>,
}

impl FieldSchema {
    /// Create a settable schema without description.
    pub fn new(name: impl Into<String>, unit: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            data_type,
            settable: true,
            description: None,
        }
    }

    /// Mark as read-only.
    pub fn read_only(mut self) -> Self {
        self.settable = false;
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Ad hoc schema inferred from the caller's requested type.
    pub fn ad_hoc(name: &str, unit: &str, host: HostType) -> Self {
        Self::new(name, unit, host.ad_hoc_data_type())
    }

    /// Same schema under a different unit (empty keeps the current one).
    pub fn with_unit(&self, unit: &str) -> Self {
        let mut schema = self.clone();
        if !unit.is_empty() {
            schema.unit = unit.to_string();
        }
        schema
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for simlink operations.

use crate::config::ConfigError;
use crate::native::{HResult, SendId};
use crate::protocol::ProtocolError;
use crate::schema::{DataType, HostType};
use crate::DefinitionId;
use std::time::Duration;
use thiserror::Error;

/// Result type for simlink operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Errors that can occur while talking to the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    // ========================================================================
    // Native layer
    // ========================================================================
    /// A native call returned a failure code synchronously.
    #[error("native call {operation} failed with {code}")]
    NativeCallFailed { operation: &'static str, code: HResult },

    /// The simulator answered a submission with an exception response.
    #[error("simulator exception {code} for send id {send_id} (parameter index {index})")]
    Exception {
        code: u32,
        send_id: SendId,
        index: u32,
    },

    // ========================================================================
    // Schema / type errors (raised before any native call)
    // ========================================================================
    /// A compound type field's Rust type does not match its declared data type.
    #[error("field '{field}' is declared {expected} but its Rust type is {found}")]
    SchemaTypeMismatch {
        field: String,
        expected: DataType,
        found: HostType,
    },

    /// Requested Rust type is incompatible with the resolved schema.
    #[error("'{name}' is {data_type} and cannot be read or written as {requested}")]
    TypeMismatch {
        name: String,
        data_type: DataType,
        requested: HostType,
    },

    /// Attempted to write a read-only field.
    #[error("'{0}' is not settable")]
    NotSettable(String),

    /// Compound type declares no fields.
    #[error("type {0} has no annotated fields")]
    NoAnnotatedFields(&'static str),

    /// Compound definition IDs would run into the scalar range.
    #[error("compound definition id {next} would reach the scalar range at {limit}")]
    DefinitionIdsExhausted { next: u32, limit: u32 },

    /// Data type has no fixed native size.
    #[error("unsupported data type {0}")]
    UnsupportedType(DataType),

    /// No conversion exists between the data type and the Rust type.
    #[error("cannot convert between {data_type} and {host}")]
    UnsupportedConversion { data_type: DataType, host: HostType },

    /// A decoded value does not hold the Rust type the caller asked for.
    #[error("expected a {expected} value, found {found}")]
    HostMismatch { expected: HostType, found: HostType },

    // ========================================================================
    // Payload errors
    // ========================================================================
    /// Payload ended before the field could be read.
    #[error("payload truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// String does not fit its fixed width.
    #[error("string of {len} bytes does not fit in {max} bytes")]
    StringTooLong { len: usize, max: usize },

    /// Response carried a different definition than the request asked for.
    #[error("response for definition {found}, request was issued for {expected}")]
    DefinitionMismatch {
        expected: DefinitionId,
        found: DefinitionId,
    },

    /// Malformed native message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// No response arrived before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Request was canceled by the caller or by shutdown.
    #[error("request canceled")]
    Canceled,

    /// Operation attempted after the connection was shut down.
    #[error("connection disposed")]
    Disposed,

    /// The connection must be opened from inside a tokio runtime.
    #[error("no tokio runtime available to run the dispatch loop")]
    NoRuntime,

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SimError {
    /// Create a native call failure
    pub fn native(operation: &'static str, code: HResult) -> Self {
        Self::NativeCallFailed { operation, code }
    }

    /// True for the terminal outcomes driven by the caller or the lifecycle
    /// rather than by the simulator.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled | Self::Disposed)
    }
}

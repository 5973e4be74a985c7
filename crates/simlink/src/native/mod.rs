// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Native service contract.
//!
//! The simulator API is a handful of synchronous submit calls and one
//! non-blocking "next message" poll. Each submit returns a [`SendId`]
//! the simulator uses to tag exception responses; request-carrying calls
//! additionally embed the caller's [`RequestId`] so value responses can be
//! correlated later.
//!
//! [`NativeService::poll_next`] is only ever called by one consumer at a
//! time; implementations need not make it reentrant.

pub mod mock;

use crate::schema::DataType;
use crate::{DefinitionId, ObjectId, RequestId};
use std::fmt;

/// Status code returned by a native call (negative = failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    pub const OK: Self = Self(0);
    /// Generic failure.
    pub const FAIL: Self = Self(0x8000_4005_u32 as i32);

    pub fn is_success(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

/// Packet identifier the simulator assigns to each submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SendId(pub u32);

impl fmt::Display for SendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a native submission.
pub type NativeResult = Result<SendId, HResult>;

/// Initial placement of a created object.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InitPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub pitch: f64,
    pub bank: f64,
    pub heading: f64,
    pub on_ground: bool,
    pub airspeed: u32,
}

/// Parameters of an object-creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpawn {
    /// Container title of the object to create.
    pub title: String,
    pub position: InitPosition,
}

impl ObjectSpawn {
    pub fn new(title: impl Into<String>, position: InitPosition) -> Self {
        Self {
            title: title.into(),
            position,
        }
    }
}

/// The simulator's native call surface.
pub trait NativeService: Send + Sync + 'static {
    /// Append one field to a data definition.
    fn add_to_definition(
        &self,
        definition: DefinitionId,
        name: &str,
        unit: &str,
        data_type: DataType,
    ) -> NativeResult;

    /// Remove all fields from a data definition.
    fn clear_definition(&self, definition: DefinitionId) -> NativeResult;

    /// Ask for one sample of `definition` on `object`, tagged with `request`.
    fn request_data_once(
        &self,
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
    ) -> NativeResult;

    /// Write a payload laid out per `definition` to `object`.
    fn set_data(&self, definition: DefinitionId, object: ObjectId, payload: &[u8]) -> NativeResult;

    /// Create a simulated object; acknowledged with the request ID.
    fn create_object(&self, request: RequestId, spawn: &ObjectSpawn) -> NativeResult;

    /// Remove a previously created object.
    fn remove_object(&self, request: RequestId, object: ObjectId) -> NativeResult;

    /// Next queued message, if any. Must not block.
    fn poll_next(&self) -> Option<Vec<u8>>;

    /// Release the native session.
    fn close(&self) {}
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed access to simulator variables.
//!
//! [`SimVars`] resolves a variable name to a schema, makes sure a native
//! definition exists for it, and issues the request. Names known to the
//! registry are checked against the requested Rust type (and settability
//! for writes) before anything reaches the native layer; unknown names get
//! an ad hoc schema inferred from the Rust type.
//!
//! ```rust,no_run
//! use simlink::{Connection, RequestOptions};
//! use simlink::native::mock::MockNative;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> simlink::Result<()> {
//! let connection = Connection::open(Arc::new(MockNative::new()))?;
//! let vars = connection.simvars();
//!
//! let latitude: f64 = vars.get("PLANE LATITUDE", "degrees").await?;
//! let on_ground: bool = vars
//!     .get_with("SIM ON GROUND", "", RequestOptions::new().timeout(Duration::from_secs(1)))
//!     .await?;
//! vars.set("PLANE ALTITUDE", "feet", 3500.0f64)?;
//! # Ok(())
//! # }
//! ```

use crate::binder::SimStruct;
use crate::cancel::CancelToken;
use crate::codec::{self, SimType};
use crate::connection::Shared;
use crate::definitions::Registered;
use crate::dispatch::{Reply, RequestKind};
use crate::error::{Result, SimError};
use crate::layout;
use crate::schema::{FieldSchema, HostType};
use crate::ObjectId;
use std::sync::Arc;
use std::time::Duration;

/// Deadline applied to one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deadline {
    /// Connection default (`request_timeout_ms`).
    #[default]
    Default,
    After(Duration),
    /// Wait until answered, canceled or shut down.
    Never,
}

impl Deadline {
    pub(crate) fn resolve(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Default => default,
            Self::After(limit) => Some(limit),
            Self::Never => None,
        }
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Target object (the user aircraft by default).
    pub object: ObjectId,
    pub deadline: Deadline,
    pub cancel: Option<CancelToken>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, object: ObjectId) -> Self {
        self.object = object;
        self
    }

    pub fn timeout(mut self, limit: Duration) -> Self {
        self.deadline = Deadline::After(limit);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.deadline = Deadline::Never;
        self
    }

    pub fn cancel_with(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Simulator variable manager.
#[derive(Clone)]
pub struct SimVars {
    shared: Arc<Shared>,
}

impl SimVars {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Read `name` in `unit` from the user aircraft.
    pub async fn get<T: SimType>(&self, name: &str, unit: &str) -> Result<T> {
        self.get_with(name, unit, RequestOptions::default()).await
    }

    /// Read `name` in `unit` with explicit options.
    pub async fn get_with<T: SimType>(
        &self,
        name: &str,
        unit: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let shared = &self.shared;
        shared.check_start(&options)?;
        let (schema, registered) = self.prepare(name, unit, T::HOST, Access::Read)?;

        let kind = RequestKind::Scalar {
            definition: registered.id,
            data_type: registered.data_type,
            host: T::HOST,
        };
        let object = options.object;
        let reply = shared
            .submit(&shared.data, kind, "RequestDataOnSimObject", options, |id| {
                shared.native.request_data_once(id, registered.id, object)
            })
            .await?;

        match reply {
            Reply::Value(value) => T::from_value(value),
            Reply::Fields(_) => Err(SimError::TypeMismatch {
                name: schema.name,
                data_type: registered.data_type,
                requested: T::HOST,
            }),
        }
    }

    /// Write `value` to `name` on the user aircraft.
    ///
    /// Returns once the native layer accepted the write. The simulator
    /// does not acknowledge writes; a rejected write surfaces later as a
    /// [`ConnectionEvent::Exception`](crate::ConnectionEvent::Exception).
    pub fn set<T: SimType>(&self, name: &str, unit: &str, value: T) -> Result<()> {
        self.set_on(name, unit, value, ObjectId::USER)
    }

    /// Write `value` to `name` on `object`.
    pub fn set_on<T: SimType>(
        &self,
        name: &str,
        unit: &str,
        value: T,
        object: ObjectId,
    ) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;
        let (_, registered) = self.prepare(name, unit, T::HOST, Access::Write)?;

        let payload = codec::encode(&value.to_value(), registered.data_type)?;
        shared
            .native
            .set_data(registered.id, object, &payload)
            .map_err(|code| SimError::native("SetDataOnSimObject", code))?;
        Ok(())
    }

    /// Read a compound type from the user aircraft.
    pub async fn get_struct<T: SimStruct>(&self) -> Result<T> {
        self.get_struct_with(RequestOptions::default()).await
    }

    /// Read a compound type with explicit options.
    pub async fn get_struct_with<T: SimStruct>(&self, options: RequestOptions) -> Result<T> {
        let shared = &self.shared;
        shared.check_start(&options)?;
        let binding = shared.binder.bind::<T>()?;
        let definition = binding.definition;

        let first_host = binding.fields[0].host;

        let object = options.object;
        let kind = RequestKind::Compound { binding };
        let reply = shared
            .submit(&shared.data, kind, "RequestDataOnSimObject", options, |id| {
                shared.native.request_data_once(id, definition, object)
            })
            .await?;

        match reply {
            Reply::Fields(values) => T::from_values(values),
            Reply::Value(value) => Err(SimError::HostMismatch {
                expected: first_host,
                found: value.host_type(),
            }),
        }
    }

    /// Write every field of a compound type in one native call.
    pub fn set_struct<T: SimStruct>(&self, value: &T, object: ObjectId) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;

        for spec in T::fields() {
            if let Some(schema) = shared.registry.get(spec.name) {
                if !schema.settable {
                    return Err(SimError::NotSettable(schema.name.clone()));
                }
            }
        }
        let binding = shared.binder.bind::<T>()?;
        let payload = binding.encode(&value.to_values())?;
        shared
            .native
            .set_data(binding.definition, object, &payload)
            .map_err(|code| SimError::native("SetDataOnSimObject", code))?;
        Ok(())
    }

    /// Schema a request for `name` would use, without registering it.
    pub fn resolve(&self, name: &str, unit: &str, host: HostType) -> Result<FieldSchema> {
        self.resolve_for(name, unit, host, Access::Read)
    }

    fn resolve_for(
        &self,
        name: &str,
        unit: &str,
        host: HostType,
        access: Access,
    ) -> Result<FieldSchema> {
        let schema = match self.shared.registry.get(name) {
            Some(known) => {
                if !codec::is_convertible(known.data_type, host) {
                    return Err(SimError::TypeMismatch {
                        name: known.name.clone(),
                        data_type: known.data_type,
                        requested: host,
                    });
                }
                if access == Access::Write && !known.settable {
                    return Err(SimError::NotSettable(known.name.clone()));
                }
                known.with_unit(unit)
            }
            None => FieldSchema::ad_hoc(name.trim(), unit, host),
        };
        layout::size_of(schema.data_type)?;
        Ok(schema)
    }

    fn prepare(
        &self,
        name: &str,
        unit: &str,
        host: HostType,
        access: Access,
    ) -> Result<(FieldSchema, Registered)> {
        let schema = self.resolve_for(name, unit, host, access)?;
        let registered = self.shared.definitions.ensure(&schema)?;
        // An earlier request may have registered this key under another type.
        if !codec::is_convertible(registered.data_type, host) {
            return Err(SimError::TypeMismatch {
                name: schema.name,
                data_type: registered.data_type,
                requested: host,
            });
        }
        Ok((schema, registered))
    }
}

impl std::fmt::Debug for SimVars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimVars").finish_non_exhaustive()
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! simlink: async client for a flight simulator's native data API
//!
//! The simulator exposes fire-and-forget submit calls and a single
//! "next message" poll. simlink turns that stream into concurrent, typed,
//! cancelable and timeout-bounded requests.
//!
//! # Features
//!
//! - **Typed variables**: `get::<f64>("PLANE LATITUDE", "degrees")`, with
//!   registry-checked types and settability
//! - **Compound types**: read and write whole structs declared with
//!   [`sim_struct!`]
//! - **Definition caching**: one native registration per `(name, unit)`,
//!   shared by concurrent first-time callers
//! - **Correlation**: responses are demultiplexed by request ID, in any order
//! - **Timeouts and cancellation**: per request, first outcome wins
//! - **AI objects**: creation and removal through the same primitive
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use simlink::{Connection, ObjectId};
//! # use simlink::native::mock::MockNative;
//! use std::sync::Arc;
//!
//! simlink::sim_struct! {
//!     #[derive(Debug)]
//!     pub struct Position {
//!         #[sim("PLANE LATITUDE", "degrees", Float64)]
//!         pub latitude: f64,
//!         #[sim("PLANE LONGITUDE", "degrees", Float64)]
//!         pub longitude: f64,
//!     }
//! }
//!
//! # async fn example() -> simlink::Result<()> {
//! # let native = Arc::new(MockNative::new());
//! let connection = Connection::open(native)?;
//! let vars = connection.simvars();
//!
//! let heading: f64 = vars.get("PLANE HEADING DEGREES TRUE", "degrees").await?;
//! let position: Position = vars.get_struct().await?;
//! vars.set("GENERAL ENG THROTTLE LEVER POSITION:1", "percent", 80.0f64)?;
//!
//! connection.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! app_name = "copilot"
//! request_timeout_ms = 10000
//! log_level = "info"
//!
//! [dispatch]
//! spin_polls = 8
//! idle_min_us = 50
//! idle_max_us = 2000
//! ```

pub mod binder;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod connection;
pub mod definitions;
pub mod dispatch;
pub mod error;
mod ids;
pub mod layout;
pub mod logging;
pub mod native;
pub mod objects;
pub mod pending;
pub mod protocol;
pub mod schema;
pub mod simvars;

pub use binder::{FieldSpec, SimStruct};
pub use cancel::{CancelRegistration, CancelToken};
pub use codec::{LatLonAlt, SimType, SimValue, Xyz};
pub use config::{ConfigError, ConnectionConfig, DispatchConfig};
pub use connection::{Connection, ConnectionBuilder, ConnectionEvent, ConnectionStats};
pub use dispatch::DispatchOutcome;
pub use error::{Result, SimError};
pub use ids::{DefinitionId, ObjectId, RequestId};
pub use objects::{AiObjects, LifecycleEvent};
pub use schema::{DataType, FieldSchema, HostType, SchemaRegistry};
pub use simvars::{Deadline, RequestOptions, SimVars};

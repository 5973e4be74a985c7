// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection to the simulator.
//!
//! A [`Connection`] owns the per-session state shared by every request
//! handle: definition and binding caches, pending tables and the
//! dispatcher. By default it spawns the dispatch loop on the current tokio
//! runtime; with [`ConnectionBuilder::manual_dispatch`] the host drives
//! dispatch itself through [`Connection::pump`].
//!
//! # Example
//!
//! ```rust
//! use simlink::native::mock::MockNative;
//! use simlink::Connection;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> simlink::Result<()> {
//! let native = Arc::new(MockNative::answering(47.25f64.to_le_bytes().to_vec()));
//! let connection = Connection::open(native)?;
//!
//! let latitude: f64 = connection.simvars().get("PLANE LATITUDE", "degrees").await?;
//! assert_eq!(latitude, 47.25);
//!
//! connection.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::binder::StructBinder;
use crate::config::ConnectionConfig;
use crate::definitions::DefinitionCache;
use crate::dispatch::{DataTable, DispatchOutcome, Dispatcher};
use crate::error::{Result, SimError};
use crate::logging::{LogCrateOutput, Logger, Output};
use crate::native::{NativeResult, NativeService, SendId};
use crate::objects::{AiObjects, LifecycleEvent, ObjectTracker};
use crate::pending::{self, PendingTable, RequestIds};
use crate::schema::SchemaRegistry;
use crate::simvars::{RequestOptions, SimVars};
use crate::RequestId;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Notifications published by a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The simulator confirmed the session.
    Open,
    /// The simulator ended the session.
    Quit,
    /// The simulator rejected a submission.
    Exception {
        code: u32,
        send_id: SendId,
        index: u32,
        /// Request the exception was delivered to, if any.
        request: Option<RequestId>,
    },
    Lifecycle(LifecycleEvent),
}

/// Snapshot of connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub timed_out: u64,
    /// Responses that matched no pending request.
    pub orphaned: u64,
    pub malformed: u64,
    /// Messages dispatched.
    pub dispatched: u64,
    /// Records currently awaiting a response.
    pub in_flight: usize,
    /// Cached scalar definitions.
    pub definitions: usize,
    /// Cached compound bindings.
    pub bindings: usize,
}

/// State shared by a connection and its handles.
pub(crate) struct Shared {
    pub(crate) config: ConnectionConfig,
    pub(crate) native: Arc<dyn NativeService>,
    pub(crate) registry: Arc<SchemaRegistry>,
    pub(crate) definitions: DefinitionCache,
    pub(crate) binder: StructBinder,
    pub(crate) request_ids: RequestIds,
    pub(crate) data: Arc<DataTable>,
    pub(crate) objects: Arc<ObjectTracker>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) events: broadcast::Sender<ConnectionEvent>,
    pub(crate) log: Logger,
}

impl Shared {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.dispatcher.is_closed() {
            return Err(SimError::Disposed);
        }
        Ok(())
    }

    /// Fail fast for a closed connection or an already-canceled token.
    pub(crate) fn check_start(&self, options: &RequestOptions) -> Result<()> {
        self.ensure_open()?;
        if options.cancel.as_ref().is_some_and(|token| token.is_canceled()) {
            return Err(SimError::Canceled);
        }
        Ok(())
    }

    /// Issue one correlated request and wait for its record to complete.
    ///
    /// The record is inserted before `issue` runs, so a response can never
    /// arrive ahead of it.
    pub(crate) async fn submit<M, T, F>(
        &self,
        table: &Arc<PendingTable<M, T>>,
        meta: M,
        operation: &'static str,
        options: RequestOptions,
        issue: F,
    ) -> Result<T>
    where
        M: Send + Sync + 'static,
        T: Send + 'static,
        F: FnOnce(RequestId) -> NativeResult,
    {
        self.check_start(&options)?;

        let id = self.request_ids.next();
        let rx = table.insert(id, meta)?;
        match issue(id) {
            Ok(send_id) => {
                if table.bind_send(id, send_id) {
                    self.log.debug(format_args!(
                        "{} for {} failed before it was bound",
                        operation, id
                    ));
                }
            }
            Err(code) => {
                table.discard(id);
                self.log.debug(format_args!("{} for {} failed: {}", operation, id, code));
                return Err(SimError::native(operation, code));
            }
        }

        let _registration = options.cancel.as_ref().map(|token| {
            let table = Arc::clone(table);
            token.on_cancel(move || {
                table.cancel(id);
            })
        });
        let limit = options.deadline.resolve(self.config.request_timeout());
        pending::await_reply(table, id, rx, limit).await
    }
}

/// Builder for [`Connection`].
pub struct ConnectionBuilder {
    native: Arc<dyn NativeService>,
    config: ConnectionConfig,
    registry: Option<Arc<SchemaRegistry>>,
    output: Option<Arc<dyn Output>>,
    manual_dispatch: bool,
}

impl ConnectionBuilder {
    pub fn new(native: Arc<dyn NativeService>) -> Self {
        Self {
            native,
            config: ConnectionConfig::default(),
            registry: None,
            output: None,
            manual_dispatch: false,
        }
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the configuration from a TOML file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        self.config = ConnectionConfig::from_file(path)?;
        Ok(self)
    }

    /// Use `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Send log records to `output` (default: the `log` facade).
    pub fn log_output(mut self, output: Arc<dyn Output>) -> Self {
        self.output = Some(output);
        self
    }

    /// Do not spawn the dispatch loop; call [`Connection::pump`] instead.
    pub fn manual_dispatch(mut self) -> Self {
        self.manual_dispatch = true;
        self
    }

    /// Open the connection.
    ///
    /// Unless dispatch is manual this must run inside a tokio runtime.
    pub fn open(self) -> Result<Connection> {
        let config = self.config;
        config.validate()?;

        let runtime = if self.manual_dispatch {
            None
        } else {
            Some(tokio::runtime::Handle::try_current().map_err(|_| SimError::NoRuntime)?)
        };

        let output = self.output.unwrap_or_else(|| Arc::new(LogCrateOutput));
        let log = Logger::new(output, config.log_level());
        let native = self.native;
        let registry = self.registry.unwrap_or_else(SchemaRegistry::global);

        let (events, _) = broadcast::channel(config.event_capacity);
        let data = Arc::new(DataTable::new());
        let objects = Arc::new(ObjectTracker::new(events.clone(), log.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&native),
            Arc::clone(&data),
            Arc::clone(&objects),
            events.clone(),
            log.clone(),
        ));

        let shared = Arc::new(Shared {
            definitions: DefinitionCache::new(
                Arc::clone(&native),
                config.definition_id_base,
                config.definition_warn_threshold,
                log.clone(),
            ),
            binder: StructBinder::new(
                Arc::clone(&native),
                config.struct_definition_id_base..config.definition_id_base,
                log.clone(),
            ),
            request_ids: RequestIds::new(),
            native,
            registry,
            data,
            objects,
            dispatcher: Arc::clone(&dispatcher),
            events,
            log: log.clone(),
            config,
        });

        let task = runtime.map(|handle| {
            handle.spawn(dispatcher.run(shared.config.dispatch.clone()))
        });
        log.info(format_args!(
            "connection '{}' open ({} dispatch)",
            shared.config.app_name,
            if task.is_some() { "background" } else { "manual" }
        ));

        Ok(Connection {
            shared,
            task: Mutex::new(task),
        })
    }
}

/// An open simulator session.
pub struct Connection {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn builder(native: Arc<dyn NativeService>) -> ConnectionBuilder {
        ConnectionBuilder::new(native)
    }

    /// Open with the default configuration and background dispatch.
    pub fn open(native: Arc<dyn NativeService>) -> Result<Self> {
        ConnectionBuilder::new(native).open()
    }

    /// Simulator variable access.
    pub fn simvars(&self) -> SimVars {
        SimVars::new(Arc::clone(&self.shared))
    }

    /// Simulated object lifecycle.
    pub fn objects(&self) -> AiObjects {
        AiObjects::new(Arc::clone(&self.shared))
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.shared.registry
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Dispatch every queued native message now.
    pub fn pump(&self) -> Vec<DispatchOutcome> {
        let mut outcomes = Vec::new();
        self.shared.dispatcher.drain(|outcome| outcomes.push(outcome));
        outcomes
    }

    pub fn is_closed(&self) -> bool {
        self.shared.dispatcher.is_closed()
    }

    pub fn stats(&self) -> ConnectionStats {
        let shared = &self.shared;
        let pending = shared.data.stats() + shared.objects.stats();
        let dispatch = shared.dispatcher.stats();
        ConnectionStats {
            completed: pending.completed,
            failed: pending.failed,
            canceled: pending.canceled,
            timed_out: pending.timed_out,
            orphaned: dispatch.orphaned,
            malformed: dispatch.malformed,
            dispatched: dispatch.handled,
            in_flight: shared.data.len() + shared.objects.pending().len(),
            definitions: shared.definitions.len(),
            bindings: shared.binder.len(),
        }
    }

    /// Close the session.
    ///
    /// Every outstanding request completes with [`SimError::Canceled`],
    /// caches are invalidated, and the dispatch loop is awaited. Later
    /// requests fail with [`SimError::Disposed`].
    pub async fn shutdown(&self) {
        let shared = &self.shared;
        shared.dispatcher.close();
        shared.definitions.invalidate();
        shared.binder.invalidate();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                shared.log.warn(format_args!("dispatch loop ended abnormally: {}", e));
            }
        }
        shared.log.flush();
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Stops the background loop; it exits on its next iteration.
        self.shared.dispatcher.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("app_name", &self.shared.config.app_name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::native::mock::MockNative;

    #[test]
    fn background_dispatch_needs_runtime() {
        let result = Connection::open(Arc::new(MockNative::new()));
        assert!(matches!(result, Err(SimError::NoRuntime)));
    }

    #[test]
    fn manual_dispatch_opens_without_runtime() {
        let connection = Connection::builder(Arc::new(MockNative::new()))
            .manual_dispatch()
            .open()
            .unwrap();
        assert!(!connection.is_closed());
        assert!(connection.pump().is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = ConnectionConfig {
            event_capacity: 0,
            ..ConnectionConfig::default()
        };
        let result = Connection::builder(Arc::new(MockNative::new()))
            .config(config)
            .manual_dispatch()
            .open();
        assert!(matches!(result, Err(SimError::Config(ConfigError::Invalid(_)))));
    }

    #[tokio::test]
    async fn shutdown_closes_native_and_disposes() {
        let native = Arc::new(MockNative::new());
        let connection = Connection::open(native.clone()).unwrap();
        connection.shutdown().await;

        assert!(native.is_closed());
        assert!(connection.is_closed());
        let result = connection.simvars().get::<f64>("PLANE LATITUDE", "degrees").await;
        assert!(matches!(result, Err(SimError::Disposed)));
    }

    #[test]
    fn drop_closes_native() {
        let native = Arc::new(MockNative::new());
        let connection = Connection::builder(native.clone())
            .manual_dispatch()
            .open()
            .unwrap();
        drop(connection);
        assert!(native.is_closed());
    }
}

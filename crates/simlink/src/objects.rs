// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Simulated object lifecycle.
//!
//! Object creation goes through the same correlation primitive as value
//! requests: a request ID is minted, the native create call is issued and
//! the record completes on the simulator's object-ID acknowledgement, or
//! fails on an exception for the same submission.

use crate::connection::{ConnectionEvent, Shared};
use crate::error::{Result, SimError};
use crate::logging::Logger;
use crate::native::{ObjectSpawn, SendId};
use crate::pending::{PendingStats, PendingTable};
use crate::simvars::RequestOptions;
use crate::{ObjectId, RequestId};
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Object lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created {
        request: RequestId,
        object: ObjectId,
        title: String,
    },
    CreationFailed {
        request: RequestId,
        exception: u32,
    },
    Removed {
        object: ObjectId,
    },
}

/// Pending creations and live objects.
pub(crate) struct ObjectTracker {
    pending: Arc<PendingTable<String, ObjectId>>,
    live: DashSet<ObjectId>,
    events: broadcast::Sender<ConnectionEvent>,
    log: Logger,
}

impl ObjectTracker {
    pub(crate) fn new(events: broadcast::Sender<ConnectionEvent>, log: Logger) -> Self {
        Self {
            pending: Arc::new(PendingTable::new()),
            live: DashSet::new(),
            events,
            log,
        }
    }

    pub(crate) fn pending(&self) -> &Arc<PendingTable<String, ObjectId>> {
        &self.pending
    }

    fn publish(&self, event: LifecycleEvent) {
        let _ = self.events.send(ConnectionEvent::Lifecycle(event));
    }

    /// Creation acknowledged. Returns false if no creation was pending.
    pub(crate) fn created(&self, request: RequestId, object: ObjectId) -> bool {
        let mut title = None;
        let outcome = self.pending.complete(request, |t| {
            title = Some(t.clone());
            Ok(object)
        });
        let Some(title) = outcome.and(title) else {
            return false;
        };

        self.live.insert(object);
        self.log.debug(format_args!("created '{}' as {}", title, object));
        self.publish(LifecycleEvent::Created {
            request,
            object,
            title,
        });
        true
    }

    /// Exception for a submission; fails the creation it carried, if any.
    pub(crate) fn failed(&self, send_id: SendId, exception: u32) -> Option<RequestId> {
        let error = SimError::Exception {
            code: exception,
            send_id,
            index: 0,
        };
        let request = self.pending.fail_send(send_id, error)?;
        self.log.warn(format_args!(
            "object creation {} failed with exception {}",
            request, exception
        ));
        self.publish(LifecycleEvent::CreationFailed { request, exception });
        Some(request)
    }

    pub(crate) fn removed(&self, object: ObjectId) -> bool {
        let was_live = self.live.remove(&object).is_some();
        self.publish(LifecycleEvent::Removed { object });
        was_live
    }

    pub(crate) fn cancel_all(&self) -> usize {
        self.live.clear();
        self.pending.cancel_all()
    }

    pub(crate) fn live(&self) -> Vec<ObjectId> {
        let mut live: Vec<ObjectId> = self.live.iter().map(|o| *o).collect();
        live.sort();
        live
    }

    pub(crate) fn is_live(&self, object: ObjectId) -> bool {
        self.live.contains(&object)
    }

    pub(crate) fn stats(&self) -> PendingStats {
        self.pending.stats()
    }
}

/// Creates and removes simulated objects.
#[derive(Clone)]
pub struct AiObjects {
    shared: Arc<Shared>,
}

impl AiObjects {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Create an object and wait for the simulator to assign its ID.
    pub async fn create(&self, spawn: ObjectSpawn) -> Result<ObjectId> {
        self.create_with(spawn, RequestOptions::default()).await
    }

    /// Create an object with explicit timeout and cancellation.
    ///
    /// `options.object` is ignored.
    pub async fn create_with(
        &self,
        spawn: ObjectSpawn,
        options: RequestOptions,
    ) -> Result<ObjectId> {
        let shared = &self.shared;
        let table = shared.objects.pending();
        shared
            .submit(table, spawn.title.clone(), "AICreateObject", options, |id| {
                shared.native.create_object(id, &spawn)
            })
            .await
    }

    /// Remove a simulated object.
    pub fn remove(&self, object: ObjectId) -> Result<()> {
        let shared = &self.shared;
        shared.ensure_open()?;
        let request = shared.request_ids.next();
        shared
            .native
            .remove_object(request, object)
            .map_err(|code| SimError::native("AIRemoveObject", code))?;
        if !shared.objects.removed(object) {
            shared.log.debug(format_args!("removed untracked object {}", object));
        }
        Ok(())
    }

    /// Objects created through this connection and not yet removed.
    pub fn live(&self) -> Vec<ObjectId> {
        self.shared.objects.live()
    }

    pub fn is_live(&self, object: ObjectId) -> bool {
        self.shared.objects.is_live(object)
    }
}

impl std::fmt::Debug for AiObjects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiObjects")
            .field("live", &self.live().len())
            .finish()
    }
}

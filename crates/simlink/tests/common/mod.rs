// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use simlink::native::mock::{MockNative, NativeCall};
use simlink::native::{NativeResult, NativeService, ObjectSpawn, SendId};
use simlink::protocol;
use simlink::schema::DataType;
use simlink::{Connection, DefinitionId, ObjectId, RequestId, SchemaRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mock answering data requests with a payload chosen by variable name.
///
/// Names are matched exactly as they reach the native registration.
pub fn answering_by_name(values: &[(&str, Vec<u8>)]) -> Arc<MockNative> {
    let values: HashMap<String, Vec<u8>> = values
        .iter()
        .map(|(name, payload)| (name.to_string(), payload.clone()))
        .collect();
    let names: Mutex<HashMap<DefinitionId, String>> = Mutex::new(HashMap::new());

    let mock = Arc::new(MockNative::new());
    mock.set_responder(move |_, call| match call {
        NativeCall::AddToDefinition {
            definition, name, ..
        } => {
            names.lock().insert(*definition, name.clone());
            Vec::new()
        }
        NativeCall::RequestDataOnce {
            request,
            definition,
            object,
        } => {
            let name = names.lock().get(definition).cloned();
            match name.and_then(|n| values.get(&n)) {
                Some(payload) => vec![protocol::encode_sim_object_data(
                    *request,
                    *object,
                    *definition,
                    payload,
                )],
                None => Vec::new(),
            }
        }
        _ => Vec::new(),
    });
    mock
}

/// Connection with background dispatch and a private registry.
pub fn open(mock: &Arc<MockNative>) -> Connection {
    Connection::builder(mock.clone())
        .registry(Arc::new(SchemaRegistry::with_builtins()))
        .open()
        .unwrap()
}

/// Connection driven by [`Connection::pump`].
pub fn open_manual(mock: &Arc<MockNative>) -> Connection {
    Connection::builder(mock.clone())
        .registry(Arc::new(SchemaRegistry::with_builtins()))
        .manual_dispatch()
        .open()
        .unwrap()
}

/// Yield until `cond` holds (panics after 5s).
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Send ID of the `n`th call (0-based).
pub fn send_id_of(mock: &MockNative, n: usize) -> SendId {
    mock.sent()[n].0
}

/// Native service whose data requests return only after `stall`.
///
/// Whatever the inner mock's responder queues is visible to the dispatch
/// loop while the call is still stalled.
pub struct StalledRequests {
    pub inner: Arc<MockNative>,
    pub stall: Duration,
}

impl NativeService for StalledRequests {
    fn add_to_definition(
        &self,
        definition: DefinitionId,
        name: &str,
        unit: &str,
        data_type: DataType,
    ) -> NativeResult {
        self.inner.add_to_definition(definition, name, unit, data_type)
    }

    fn clear_definition(&self, definition: DefinitionId) -> NativeResult {
        self.inner.clear_definition(definition)
    }

    fn request_data_once(
        &self,
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
    ) -> NativeResult {
        let result = self.inner.request_data_once(request, definition, object);
        std::thread::sleep(self.stall);
        result
    }

    fn set_data(&self, definition: DefinitionId, object: ObjectId, payload: &[u8]) -> NativeResult {
        self.inner.set_data(definition, object, payload)
    }

    fn create_object(&self, request: RequestId, spawn: &ObjectSpawn) -> NativeResult {
        self.inner.create_object(request, spawn)
    }

    fn remove_object(&self, request: RequestId, object: ObjectId) -> NativeResult {
        self.inner.remove_object(request, object)
    }

    fn poll_next(&self) -> Option<Vec<u8>> {
        self.inner.poll_next()
    }

    fn close(&self) {
        self.inner.close()
    }
}

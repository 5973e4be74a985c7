// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process scriptable native service.
//!
//! Records every call, queues messages for the dispatch loop, and can be
//! told to answer requests automatically, fail the next call of a kind, or
//! stall registrations to widen race windows.
//!
//! ```rust
//! use simlink::native::mock::{MockNative, NativeCall};
//! use simlink::native::NativeService;
//! use simlink::schema::DataType;
//! use simlink::DefinitionId;
//!
//! let mock = MockNative::new();
//! mock.add_to_definition(DefinitionId(10_000), "PLANE LATITUDE", "degrees", DataType::Float64)
//!     .unwrap();
//! assert_eq!(mock.count_registrations(), 1);
//! assert!(matches!(mock.calls()[0], NativeCall::AddToDefinition { .. }));
//! ```

use super::{HResult, NativeResult, NativeService, ObjectSpawn, SendId};
use crate::protocol;
use crate::schema::DataType;
use crate::{DefinitionId, ObjectId, RequestId};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Kind of native call, used to script failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    AddToDefinition,
    ClearDefinition,
    RequestDataOnce,
    SetData,
    CreateObject,
    RemoveObject,
}

/// One recorded native call.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    AddToDefinition {
        definition: DefinitionId,
        name: String,
        unit: String,
        data_type: DataType,
    },
    ClearDefinition {
        definition: DefinitionId,
    },
    RequestDataOnce {
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
    },
    SetData {
        definition: DefinitionId,
        object: ObjectId,
        payload: Vec<u8>,
    },
    CreateObject {
        request: RequestId,
        title: String,
    },
    RemoveObject {
        request: RequestId,
        object: ObjectId,
    },
}

impl NativeCall {
    pub fn kind(&self) -> CallKind {
        match self {
            Self::AddToDefinition { .. } => CallKind::AddToDefinition,
            Self::ClearDefinition { .. } => CallKind::ClearDefinition,
            Self::RequestDataOnce { .. } => CallKind::RequestDataOnce,
            Self::SetData { .. } => CallKind::SetData,
            Self::CreateObject { .. } => CallKind::CreateObject,
            Self::RemoveObject { .. } => CallKind::RemoveObject,
        }
    }
}

/// Callback producing the messages a successful call should trigger.
pub type Responder = Arc<dyn Fn(SendId, &NativeCall) -> Vec<Vec<u8>> + Send + Sync>;

#[derive(Default)]
struct State {
    calls: Vec<(SendId, NativeCall)>,
    inbox: VecDeque<Vec<u8>>,
    fail_next: HashMap<CallKind, HResult>,
    responder: Option<Responder>,
    registration_delay: Duration,
    closed: bool,
}

/// Scriptable [`NativeService`].
pub struct MockNative {
    state: Mutex<State>,
    next_send: AtomicU32,
}

impl MockNative {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            next_send: AtomicU32::new(1),
        }
    }

    /// Mock that answers every data request with `payload` and every object
    /// creation with a fresh object ID.
    pub fn answering(payload: Vec<u8>) -> Self {
        let mock = Self::new();
        let next_object = AtomicU32::new(100);
        mock.set_responder(move |_, call| match call {
            NativeCall::RequestDataOnce {
                request,
                definition,
                object,
            } => vec![protocol::encode_sim_object_data(
                *request,
                *object,
                *definition,
                &payload,
            )],
            NativeCall::CreateObject { request, .. } => {
                let object = ObjectId(next_object.fetch_add(1, Ordering::Relaxed));
                vec![protocol::encode_assigned_object_id(*request, object)]
            }
            _ => Vec::new(),
        });
        mock
    }

    /// Queue a raw message for the next poll.
    pub fn push_message(&self, message: Vec<u8>) {
        self.state.lock().inbox.push_back(message);
    }

    /// Queue a single-entry value response.
    pub fn push_value(
        &self,
        request: RequestId,
        object: ObjectId,
        definition: DefinitionId,
        payload: &[u8],
    ) {
        self.push_message(protocol::encode_sim_object_data(
            request, object, definition, payload,
        ));
    }

    /// Queue an exception response for `send_id`.
    pub fn push_exception(&self, exception: u32, send_id: SendId) {
        self.push_message(protocol::encode_exception(exception, send_id, 0));
    }

    /// Messages queued but not yet polled.
    pub fn queued(&self) -> usize {
        self.state.lock().inbox.len()
    }

    /// Install a responder run after every successful call.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: Fn(SendId, &NativeCall) -> Vec<Vec<u8>> + Send + Sync + 'static,
    {
        self.state.lock().responder = Some(Arc::new(responder));
    }

    pub fn clear_responder(&self) {
        self.state.lock().responder = None;
    }

    /// Make the next call of `kind` fail with `code`.
    pub fn fail_next(&self, kind: CallKind, code: HResult) {
        self.state.lock().fail_next.insert(kind, code);
    }

    /// Stall every `add_to_definition` call by `delay`.
    pub fn set_registration_delay(&self, delay: Duration) {
        self.state.lock().registration_delay = delay;
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().calls.iter().map(|(_, c)| c.clone()).collect()
    }

    /// All calls with the send ID each one was assigned.
    pub fn sent(&self) -> Vec<(SendId, NativeCall)> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(_, c)| c.kind() == kind)
            .count()
    }

    pub fn count_registrations(&self) -> usize {
        self.count(CallKind::AddToDefinition)
    }

    pub fn count_requests(&self) -> usize {
        self.count(CallKind::RequestDataOnce)
    }

    /// Data requests so far as `(send_id, request, definition, object)`.
    pub fn data_requests(&self) -> Vec<(SendId, RequestId, DefinitionId, ObjectId)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|(send_id, call)| match call {
                NativeCall::RequestDataOnce {
                    request,
                    definition,
                    object,
                } => Some((*send_id, *request, *definition, *object)),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn record(&self, call: NativeCall) -> NativeResult {
        let kind = call.kind();
        let send_id = SendId(self.next_send.fetch_add(1, Ordering::Relaxed));

        let (failure, responder) = {
            let mut state = self.state.lock();
            state.calls.push((send_id, call.clone()));
            (state.fail_next.remove(&kind), state.responder.clone())
        };
        if let Some(code) = failure {
            return Err(code);
        }

        // Responder runs unlocked so it may call back into the mock.
        if let Some(responder) = responder {
            let messages = responder(send_id, &call);
            if !messages.is_empty() {
                self.state.lock().inbox.extend(messages);
            }
        }
        Ok(send_id)
    }
}

impl Default for MockNative {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockNative")
            .field("calls", &state.calls.len())
            .field("queued", &state.inbox.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl NativeService for MockNative {
    fn add_to_definition(
        &self,
        definition: DefinitionId,
        name: &str,
        unit: &str,
        data_type: DataType,
    ) -> NativeResult {
        let delay = self.state.lock().registration_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.record(NativeCall::AddToDefinition {
            definition,
            name: name.to_string(),
            unit: unit.to_string(),
            data_type,
        })
    }

    fn clear_definition(&self, definition: DefinitionId) -> NativeResult {
        self.record(NativeCall::ClearDefinition { definition })
    }

    fn request_data_once(
        &self,
        request: RequestId,
        definition: DefinitionId,
        object: ObjectId,
    ) -> NativeResult {
        self.record(NativeCall::RequestDataOnce {
            request,
            definition,
            object,
        })
    }

    fn set_data(&self, definition: DefinitionId, object: ObjectId, payload: &[u8]) -> NativeResult {
        self.record(NativeCall::SetData {
            definition,
            object,
            payload: payload.to_vec(),
        })
    }

    fn create_object(&self, request: RequestId, spawn: &ObjectSpawn) -> NativeResult {
        self.record(NativeCall::CreateObject {
            request,
            title: spawn.title.clone(),
        })
    }

    fn remove_object(&self, request: RequestId, object: ObjectId) -> NativeResult {
        self.record(NativeCall::RemoveObject { request, object })
    }

    fn poll_next(&self) -> Option<Vec<u8>> {
        self.state.lock().inbox.pop_front()
    }

    fn close(&self) {
        self.state.lock().closed = true;
    }
}

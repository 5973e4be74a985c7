// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatch loop.
//!
//! The only consumer of the native message stream. Each message is parsed
//! by kind and routed:
//!
//! - value responses complete the record carrying their request ID, decoded
//!   with the layout the record was issued for;
//! - exception responses fail the record whose submission matches their
//!   send ID, in the data table or in object bookkeeping;
//! - object-creation acknowledgements go to object bookkeeping;
//! - `Quit` closes the connection;
//! - everything else is ignored.
//!
//! Decoding errors and unmatched responses never escape the loop: the first
//! become a failed record, the second are logged and dropped.

use crate::binder::CompoundBinding;
use crate::codec::{self, SimValue};
use crate::config::DispatchConfig;
use crate::connection::ConnectionEvent;
use crate::error::{Result, SimError};
use crate::logging::Logger;
use crate::native::{NativeService, SendId};
use crate::objects::ObjectTracker;
use crate::pending::PendingTable;
use crate::protocol::{self, ExceptionBody, Message, MessageKind, ProtocolError, SimObjectData};
use crate::schema::{DataType, HostType};
use crate::{DefinitionId, ObjectId, RequestId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// What a data request expects back.
#[derive(Debug, Clone)]
pub(crate) enum RequestKind {
    Scalar {
        definition: DefinitionId,
        data_type: DataType,
        host: HostType,
    },
    Compound {
        binding: Arc<CompoundBinding>,
    },
}

/// Decoded reply of a data request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reply {
    Value(SimValue),
    /// Field values in declaration order.
    Fields(Vec<SimValue>),
}

impl RequestKind {
    pub(crate) fn definition(&self) -> DefinitionId {
        match self {
            Self::Scalar { definition, .. } => *definition,
            Self::Compound { binding } => binding.definition,
        }
    }

    fn decode(&self, data: &SimObjectData<'_>) -> Result<Reply> {
        let expected = self.definition();
        if data.definition != expected {
            return Err(SimError::DefinitionMismatch {
                expected,
                found: data.definition,
            });
        }
        match self {
            Self::Scalar {
                data_type, host, ..
            } => codec::decode(data.payload, 0, *data_type, *host).map(Reply::Value),
            Self::Compound { binding } => binding.decode(data.payload).map(Reply::Fields),
        }
    }
}

pub(crate) type DataTable = PendingTable<RequestKind, Reply>;

/// Result of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A value response completed its record.
    Delivered(RequestId),
    /// A record was failed (decode error, mismatch, truncated reply or exception).
    Failed(RequestId),
    /// A value or acknowledgement matched no record and was dropped.
    Orphaned(RequestId),
    ObjectCreated(ObjectId),
    ObjectFailed(RequestId),
    /// An exception matched no bound record. It is kept for a submission
    /// whose send ID is bound later.
    ExceptionUnmatched(SendId),
    Opened,
    Quit,
    Ignored,
    Malformed,
}

/// Dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub orphaned: u64,
    pub malformed: u64,
}

pub(crate) struct Dispatcher {
    native: Arc<dyn NativeService>,
    data: Arc<DataTable>,
    objects: Arc<ObjectTracker>,
    events: broadcast::Sender<ConnectionEvent>,
    log: Logger,
    poll_guard: Mutex<()>,
    closed: AtomicBool,
    handled: AtomicU64,
    orphaned: AtomicU64,
    malformed: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(
        native: Arc<dyn NativeService>,
        data: Arc<DataTable>,
        objects: Arc<ObjectTracker>,
        events: broadcast::Sender<ConnectionEvent>,
        log: Logger,
    ) -> Self {
        Self {
            native,
            data,
            objects,
            events,
            log,
            poll_guard: Mutex::new(()),
            closed: AtomicBool::new(false),
            handled: AtomicU64::new(0),
            orphaned: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
        }
    }

    /// Route one raw message.
    pub(crate) fn dispatch(&self, raw: &[u8]) -> DispatchOutcome {
        self.handled.fetch_add(1, Ordering::Relaxed);
        let message = match Message::parse(raw) {
            Ok((_, message)) => message,
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                self.log.warn(format_args!("dropping malformed message: {}", e));
                return self.fail_malformed(raw, e);
            }
        };

        match message {
            Message::SimObjectData(data) => self.on_value(&data),
            Message::Exception(body) => self.on_exception(body),
            Message::AssignedObjectId { request, object } => {
                if self.objects.created(request, object) {
                    DispatchOutcome::ObjectCreated(object)
                } else {
                    self.orphan(request, "object acknowledgement");
                    DispatchOutcome::Orphaned(request)
                }
            }
            Message::Open => {
                self.log.info(format_args!("simulator session open"));
                let _ = self.events.send(ConnectionEvent::Open);
                DispatchOutcome::Opened
            }
            Message::Quit => {
                self.log.info(format_args!("simulator closed the session"));
                let _ = self.events.send(ConnectionEvent::Quit);
                DispatchOutcome::Quit
            }
            Message::Null => DispatchOutcome::Ignored,
            Message::Unrecognized(kind) => {
                self.log.debug(format_args!("ignoring message kind {}", kind));
                DispatchOutcome::Ignored
            }
        }
    }

    /// Fail the record a malformed reply was addressed to, if it can be told.
    fn fail_malformed(&self, raw: &[u8], error: ProtocolError) -> DispatchOutcome {
        match protocol::salvage_request(raw) {
            Some((MessageKind::SimObjectData, request)) => {
                if self.data.fail(request, SimError::Protocol(error)) {
                    return DispatchOutcome::Failed(request);
                }
            }
            Some((MessageKind::AssignedObjectId, request)) => {
                if self.objects.pending().fail(request, SimError::Protocol(error)) {
                    return DispatchOutcome::ObjectFailed(request);
                }
            }
            _ => {}
        }
        DispatchOutcome::Malformed
    }

    fn on_value(&self, data: &SimObjectData<'_>) -> DispatchOutcome {
        match self.data.complete(data.request, |kind| kind.decode(data)) {
            Some(true) => DispatchOutcome::Delivered(data.request),
            Some(false) => {
                self.log.debug(format_args!(
                    "response for {} ({}) failed to decode",
                    data.request, data.definition
                ));
                DispatchOutcome::Failed(data.request)
            }
            None => {
                self.orphan(data.request, "value response");
                DispatchOutcome::Orphaned(data.request)
            }
        }
    }

    fn on_exception(&self, body: ExceptionBody) -> DispatchOutcome {
        let error = SimError::Exception {
            code: body.exception,
            send_id: body.send_id,
            index: body.index,
        };
        let (request, outcome) = if let Some(id) = self.data.fail_send(body.send_id, error) {
            (Some(id), DispatchOutcome::Failed(id))
        } else if let Some(id) = self.objects.failed(body.send_id, body.exception) {
            (Some(id), DispatchOutcome::ObjectFailed(id))
        } else {
            self.log.warn(format_args!(
                "simulator exception {} for send id {} matched no request",
                body.exception, body.send_id
            ));
            (None, DispatchOutcome::ExceptionUnmatched(body.send_id))
        };

        let _ = self.events.send(ConnectionEvent::Exception {
            code: body.exception,
            send_id: body.send_id,
            index: body.index,
            request,
        });
        outcome
    }

    fn orphan(&self, request: RequestId, what: &str) {
        self.orphaned.fetch_add(1, Ordering::Relaxed);
        self.log.warn(format_args!(
            "dropping {} for unknown request {}",
            what, request
        ));
    }

    /// Drain every queued message, reporting each outcome.
    ///
    /// Returns the number of messages handled. A `Quit` stops the drain and
    /// closes the dispatcher.
    pub(crate) fn drain<F>(&self, mut on_outcome: F) -> usize
    where
        F: FnMut(DispatchOutcome),
    {
        let mut handled = 0;
        let mut quit = false;
        {
            let _guard = self.poll_guard.lock();
            while !self.is_closed() {
                let Some(raw) = self.native.poll_next() else {
                    break;
                };
                let outcome = self.dispatch(&raw);
                handled += 1;
                on_outcome(outcome);
                if outcome == DispatchOutcome::Quit {
                    quit = true;
                    break;
                }
            }
        }
        if quit {
            self.close();
        }
        handled
    }

    /// Stop dispatching, cancel every outstanding record and release the
    /// native session. Only the first call has any effect.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let canceled = self.data.cancel_all() + self.objects.cancel_all();
        {
            let _guard = self.poll_guard.lock();
            self.native.close();
        }
        self.log.info(format_args!(
            "connection closed, {} outstanding request(s) canceled",
            canceled
        ));
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn stats(&self) -> DispatchStats {
        DispatchStats {
            handled: self.handled.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }

    /// Background loop: drain, then back off while the stream is idle.
    pub(crate) async fn run(self: Arc<Self>, config: DispatchConfig) {
        let mut backoff = Backoff::new(&config);
        self.log.debug(format_args!("dispatch loop started"));
        while !self.is_closed() {
            if self.drain(|_| {}) > 0 {
                backoff.reset();
                tokio::task::yield_now().await;
                continue;
            }
            match backoff.next_idle() {
                None => tokio::task::yield_now().await,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
        self.log.debug(format_args!("dispatch loop stopped"));
    }
}

/// Adaptive idle delay: a few immediate retries, then sleeps doubling from
/// the minimum up to the ceiling.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    spin_polls: u32,
    min: Duration,
    max: Duration,
    empty: u32,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &DispatchConfig) -> Self {
        let min = Duration::from_micros(config.idle_min_us);
        Self {
            spin_polls: config.spin_polls,
            min,
            max: Duration::from_micros(config.idle_max_us).max(min),
            empty: 0,
            current: min,
        }
    }

    /// Delay after one more empty poll; `None` means retry immediately.
    pub(crate) fn next_idle(&mut self) -> Option<Duration> {
        self.empty = self.empty.saturating_add(1);
        if self.empty <= self.spin_polls {
            return None;
        }
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    pub(crate) fn reset(&mut self) {
        self.empty = 0;
        self.current = self.min;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{SimStruct, StructBinder};
    use crate::logging::{LogLevel, MemoryOutput};
    use crate::native::mock::MockNative;
    use crate::pending::RequestIds;
    use crate::protocol::{self, MessageKind};
    use crate::sim_struct;

    struct Harness {
        mock: Arc<MockNative>,
        data: Arc<DataTable>,
        dispatcher: Dispatcher,
        memory: Arc<MemoryOutput>,
        events: broadcast::Receiver<ConnectionEvent>,
    }

    fn harness() -> Harness {
        let mock = Arc::new(MockNative::new());
        let memory = Arc::new(MemoryOutput::new());
        let log = Logger::new(memory.clone(), LogLevel::Debug);
        let (tx, events) = broadcast::channel(16);
        let data = Arc::new(DataTable::new());
        let objects = Arc::new(ObjectTracker::new(tx.clone(), log.clone()));
        let dispatcher = Dispatcher::new(mock.clone(), Arc::clone(&data), objects, tx, log);
        Harness {
            mock,
            data,
            dispatcher,
            memory,
            events,
        }
    }

    fn scalar(definition: u32) -> RequestKind {
        RequestKind::Scalar {
            definition: DefinitionId(definition),
            data_type: DataType::Float64,
            host: HostType::F64,
        }
    }

    #[tokio::test]
    async fn value_response_completes_record() {
        let h = harness();
        let rx = h.data.insert(RequestId(1), scalar(10_000)).unwrap();
        let raw = protocol::encode_sim_object_data(
            RequestId(1),
            ObjectId::USER,
            DefinitionId(10_000),
            &47.5f64.to_le_bytes(),
        );

        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Delivered(RequestId(1)));
        assert_eq!(rx.await.unwrap().unwrap(), Reply::Value(SimValue::F64(47.5)));
    }

    #[tokio::test]
    async fn definition_mismatch_fails_only_that_record() {
        let h = harness();
        let bad = h.data.insert(RequestId(1), scalar(10_000)).unwrap();
        let good = h.data.insert(RequestId(2), scalar(10_001)).unwrap();

        let raw = protocol::encode_sim_object_data(
            RequestId(1),
            ObjectId::USER,
            DefinitionId(10_005),
            &[0; 8],
        );
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Failed(RequestId(1)));
        assert!(matches!(
            bad.await.unwrap(),
            Err(SimError::DefinitionMismatch { .. })
        ));

        let raw = protocol::encode_sim_object_data(
            RequestId(2),
            ObjectId::USER,
            DefinitionId(10_001),
            &1.0f64.to_le_bytes(),
        );
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Delivered(RequestId(2)));
        assert!(good.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn short_payload_fails_record() {
        let h = harness();
        let rx = h.data.insert(RequestId(3), scalar(1)).unwrap();
        let raw = protocol::encode_sim_object_data(
            RequestId(3),
            ObjectId::USER,
            DefinitionId(1),
            &[0; 4],
        );
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Failed(RequestId(3)));
        assert!(matches!(rx.await.unwrap(), Err(SimError::Truncated { .. })));
    }

    #[test]
    fn unmatched_value_is_logged_and_dropped() {
        let h = harness();
        let raw = protocol::encode_sim_object_data(
            RequestId(99),
            ObjectId::USER,
            DefinitionId(1),
            &[0; 8],
        );
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Orphaned(RequestId(99)));
        assert_eq!(h.dispatcher.stats().orphaned, 1);
        assert!(h.memory.contains(LogLevel::Warning, "#99"));
    }

    #[tokio::test]
    async fn exception_fails_by_send_id_and_is_published() {
        let mut h = harness();
        let rx = h.data.insert(RequestId(4), scalar(1)).unwrap();
        h.data.bind_send(RequestId(4), SendId(12));

        let raw = protocol::encode_exception(7, SendId(12), 1);
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Failed(RequestId(4)));
        assert!(matches!(
            rx.await.unwrap(),
            Err(SimError::Exception { code: 7, index: 1, .. })
        ));
        assert_eq!(
            h.events.try_recv().unwrap(),
            ConnectionEvent::Exception {
                code: 7,
                send_id: SendId(12),
                index: 1,
                request: Some(RequestId(4)),
            }
        );
    }

    #[test]
    fn unmatched_exception_is_published() {
        let mut h = harness();
        let raw = protocol::encode_exception(3, SendId(50), 0);
        assert_eq!(
            h.dispatcher.dispatch(&raw),
            DispatchOutcome::ExceptionUnmatched(SendId(50))
        );
        assert!(matches!(
            h.events.try_recv().unwrap(),
            ConnectionEvent::Exception { request: None, .. }
        ));
    }

    #[tokio::test]
    async fn truncated_reply_fails_its_record() {
        let h = harness();
        let rx = h.data.insert(RequestId(6), scalar(1)).unwrap();
        let mut raw =
            protocol::encode_sim_object_data(RequestId(6), ObjectId::USER, DefinitionId(1), &[]);
        raw.truncate(20);
        raw[..4].copy_from_slice(&20u32.to_le_bytes());

        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Failed(RequestId(6)));
        assert!(matches!(
            rx.await.unwrap(),
            Err(SimError::Protocol(ProtocolError::Truncated { .. }))
        ));
        assert_eq!(h.dispatcher.stats().malformed, 1);

        // Nothing left to fail.
        assert_eq!(h.dispatcher.dispatch(&raw), DispatchOutcome::Malformed);
    }

    #[tokio::test]
    async fn exception_before_binding_reaches_the_record() {
        let h = harness();
        let rx = h.data.insert(RequestId(7), scalar(1)).unwrap();

        let raw = protocol::encode_exception(5, SendId(70), 2);
        assert_eq!(
            h.dispatcher.dispatch(&raw),
            DispatchOutcome::ExceptionUnmatched(SendId(70))
        );
        assert!(h.data.bind_send(RequestId(7), SendId(70)));
        assert!(matches!(
            rx.await.unwrap(),
            Err(SimError::Exception { code: 5, index: 2, .. })
        ));
    }

    #[test]
    fn malformed_and_unknown_messages_do_not_panic() {
        let h = harness();
        assert_eq!(h.dispatcher.dispatch(&[1, 2, 3]), DispatchOutcome::Malformed);
        let unknown = protocol::encode_empty(MessageKind::Unrecognized(42));
        assert_eq!(h.dispatcher.dispatch(&unknown), DispatchOutcome::Ignored);
        assert_eq!(h.dispatcher.stats().malformed, 1);
    }

    #[tokio::test]
    async fn compound_reply_in_declaration_order() {
        sim_struct! {
            struct Fix {
                #[sim("PLANE LATITUDE", "degrees", Float64, order = 1)]
                latitude: f64,
                #[sim("PLANE LONGITUDE", "degrees", Float64, order = 0)]
                longitude: f64,
            }
        }

        let h = harness();
        let binder = StructBinder::new(h.mock.clone(), 1..10_000, Logger::default());
        let binding = binder.bind::<Fix>().unwrap();
        let rx = h
            .data
            .insert(RequestId(5), RequestKind::Compound { binding: Arc::clone(&binding) })
            .unwrap();

        let mut payload = (-122.0f64).to_le_bytes().to_vec();
        payload.extend_from_slice(&47.0f64.to_le_bytes());
        let raw = protocol::encode_sim_object_data(
            RequestId(5),
            ObjectId::USER,
            binding.definition,
            &payload,
        );
        h.dispatcher.dispatch(&raw);

        let fix = match rx.await.unwrap().unwrap() {
            Reply::Fields(values) => Fix::from_values(values).unwrap(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(fix.latitude, 47.0);
        assert_eq!(fix.longitude, -122.0);
    }

    #[tokio::test]
    async fn quit_closes_and_cancels() {
        let ids = RequestIds::new();
        let h = harness();
        let rx = h.data.insert(ids.next(), scalar(1)).unwrap();
        h.mock.push_message(protocol::encode_empty(MessageKind::Quit));
        h.mock.push_value(RequestId(1), ObjectId::USER, DefinitionId(1), &[0; 8]);

        let mut outcomes = Vec::new();
        assert_eq!(h.dispatcher.drain(|o| outcomes.push(o)), 1);
        assert_eq!(outcomes, vec![DispatchOutcome::Quit]);
        assert!(h.dispatcher.is_closed());
        assert!(h.mock.is_closed());
        assert!(matches!(rx.await.unwrap(), Err(SimError::Canceled)));
        // The value queued behind Quit is never polled.
        assert_eq!(h.mock.queued(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let h = harness();
        assert!(h.dispatcher.close());
        assert!(!h.dispatcher.close());
        assert_eq!(h.dispatcher.drain(|_| {}), 0);
    }

    #[test]
    fn backoff_spins_then_doubles_to_ceiling() {
        let mut backoff = Backoff::new(&DispatchConfig {
            spin_polls: 2,
            idle_min_us: 100,
            idle_max_us: 350,
        });
        assert_eq!(backoff.next_idle(), None);
        assert_eq!(backoff.next_idle(), None);
        assert_eq!(backoff.next_idle(), Some(Duration::from_micros(100)));
        assert_eq!(backoff.next_idle(), Some(Duration::from_micros(200)));
        assert_eq!(backoff.next_idle(), Some(Duration::from_micros(350)));
        assert_eq!(backoff.next_idle(), Some(Duration::from_micros(350)));

        backoff.reset();
        assert_eq!(backoff.next_idle(), None);
    }
}

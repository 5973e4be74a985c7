// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending request table.
//!
//! Maps a locally minted [`RequestId`] to the completion handle of an
//! in-flight operation. Each record holds a `oneshot` sender; the first
//! path that removes the record from the table (value, failure, cancel,
//! timeout, shutdown) owns the sender and decides the outcome. Every later
//! attempt finds nothing and is a no-op.
//!
//! Records can also be looked up by the [`SendId`] of the native submission
//! that carried them, so exception responses reach the right caller. The
//! send ID is only known once the native call returns; an exception read
//! before that is parked and claimed by [`PendingTable::bind_send`].

use crate::error::{Result, SimError};
use crate::native::SendId;
use crate::RequestId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

/// Allocator of request IDs shared by every table of a connection.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU32,
}

impl RequestIds {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn next(&self) -> RequestId {
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Exceptions kept for submissions whose send ID is not bound yet.
const UNCLAIMED_CAPACITY: usize = 32;

/// Terminal transition counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub completed: u64,
    pub failed: u64,
    pub canceled: u64,
    pub timed_out: u64,
}

impl std::ops::Add for PendingStats {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            canceled: self.canceled + other.canceled,
            timed_out: self.timed_out + other.timed_out,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    failed: AtomicU64,
    canceled: AtomicU64,
    timed_out: AtomicU64,
}

struct Pending<M, T> {
    meta: M,
    send_id: Option<SendId>,
    tx: oneshot::Sender<Result<T>>,
}

/// Single-shot completion table.
///
/// `M` is per-record metadata the completing side needs (for instance the
/// layout to decode with); `T` is the value delivered to the waiter.
pub struct PendingTable<M, T> {
    entries: DashMap<RequestId, Pending<M, T>>,
    by_send: DashMap<SendId, RequestId>,
    // Held across every by_send lookup and binding.
    unclaimed: Mutex<VecDeque<(SendId, SimError)>>,
    closed: AtomicBool,
    counters: Counters,
}

impl<M, T> PendingTable<M, T> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_send: DashMap::new(),
            unclaimed: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Register a record and return the receiving half of its handle.
    ///
    /// Fails with [`SimError::Disposed`] once the table is closed.
    pub fn insert(&self, id: RequestId, meta: M) -> Result<oneshot::Receiver<Result<T>>> {
        if self.is_closed() {
            return Err(SimError::Disposed);
        }
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            id,
            Pending {
                meta,
                send_id: None,
                tx,
            },
        );
        // A concurrent close may have drained the table before our insert.
        if self.is_closed() {
            self.take(id);
            return Err(SimError::Disposed);
        }
        Ok(rx)
    }

    /// Associate the native submission carrying `id`.
    ///
    /// If an exception for `send_id` was already parked by
    /// [`fail_send`](Self::fail_send), the record fails with it at once and
    /// this returns true.
    pub fn bind_send(&self, id: RequestId, send_id: SendId) -> bool {
        let early = {
            let mut unclaimed = self.unclaimed.lock();
            match self.entries.get_mut(&id) {
                Some(mut entry) => {
                    entry.send_id = Some(send_id);
                    self.by_send.insert(send_id, id);
                }
                None => return false,
            }
            let position = unclaimed.iter().position(|(send, _)| *send == send_id);
            position.and_then(|index| unclaimed.remove(index))
        };
        match early {
            Some((_, error)) => self.fail(id, error),
            None => false,
        }
    }

    fn take(&self, id: RequestId) -> Option<Pending<M, T>> {
        let (_, pending) = self.entries.remove(&id)?;
        if let Some(send_id) = pending.send_id {
            self.by_send.remove(&send_id);
        }
        Some(pending)
    }

    /// Complete `id` with the result of `resolve` applied to its metadata.
    ///
    /// Returns `None` if no record exists, otherwise whether the record
    /// completed successfully.
    pub fn complete<F>(&self, id: RequestId, resolve: F) -> Option<bool>
    where
        F: FnOnce(&M) -> Result<T>,
    {
        let pending = self.take(id)?;
        let result = resolve(&pending.meta);
        let ok = result.is_ok();
        let counter = if ok {
            &self.counters.completed
        } else {
            &self.counters.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        let _ = pending.tx.send(result);
        Some(ok)
    }

    /// Fail `id` with `error`. Returns false if no record exists.
    pub fn fail(&self, id: RequestId, error: SimError) -> bool {
        self.finish(id, error, &self.counters.failed)
    }

    /// Fail the record submitted under `send_id`, returning its request ID.
    ///
    /// With no record bound to `send_id`, the error is parked for a later
    /// [`bind_send`](Self::bind_send) and `None` is returned. Only the most
    /// recent exceptions are kept.
    pub fn fail_send(&self, send_id: SendId, error: SimError) -> Option<RequestId> {
        let bound = {
            let mut unclaimed = self.unclaimed.lock();
            let bound = self.by_send.get(&send_id).map(|id| *id);
            if bound.is_none() && !self.is_closed() {
                if unclaimed.len() == UNCLAIMED_CAPACITY {
                    unclaimed.pop_front();
                }
                unclaimed.push_back((send_id, error));
                return None;
            }
            bound
        };
        let id = bound?;
        self.fail(id, error).then_some(id)
    }

    /// Exceptions parked for submissions not bound yet.
    pub fn unclaimed(&self) -> usize {
        self.unclaimed.lock().len()
    }

    /// Mark `id` canceled. Returns false if it already reached a terminal state.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.finish(id, SimError::Canceled, &self.counters.canceled)
    }

    /// Mark `id` timed out after `limit`.
    pub fn time_out(&self, id: RequestId, limit: Duration) -> bool {
        self.finish(id, SimError::Timeout(limit), &self.counters.timed_out)
    }

    /// Drop `id` without delivering anything or counting it.
    pub fn discard(&self, id: RequestId) -> bool {
        self.take(id).is_some()
    }

    fn finish(&self, id: RequestId, error: SimError, counter: &AtomicU64) -> bool {
        match self.take(id) {
            Some(pending) => {
                counter.fetch_add(1, Ordering::Relaxed);
                let _ = pending.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Close the table and cancel every outstanding record.
    pub fn cancel_all(&self) -> usize {
        self.closed.store(true, Ordering::SeqCst);
        self.unclaimed.lock().clear();
        let ids: Vec<RequestId> = self.entries.iter().map(|e| *e.key()).collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> PendingStats {
        PendingStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            canceled: self.counters.canceled.load(Ordering::Relaxed),
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
        }
    }
}

impl<M, T> Default for PendingTable<M, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, T> std::fmt::Debug for PendingTable<M, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTable")
            .field("pending", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Cancels the record if the waiting future is dropped early.
struct AbandonGuard<'a, M, T> {
    table: &'a PendingTable<M, T>,
    id: RequestId,
}

impl<M, T> Drop for AbandonGuard<'_, M, T> {
    fn drop(&mut self) {
        self.table.cancel(self.id);
    }
}

/// Wait for the record `id` to complete, racing an optional deadline.
///
/// When the deadline wins the record is marked timed out; if another
/// transition got there first, that outcome is returned instead.
pub async fn await_reply<M, T>(
    table: &PendingTable<M, T>,
    id: RequestId,
    mut rx: oneshot::Receiver<Result<T>>,
    limit: Option<Duration>,
) -> Result<T> {
    let _guard = AbandonGuard { table, id };

    let received = match limit {
        None => rx.await,
        Some(limit) => match tokio::time::timeout(limit, &mut rx).await {
            Ok(received) => received,
            Err(_) => {
                table.time_out(id, limit);
                rx.await
            }
        },
    };
    // A dropped sender means the table itself went away.
    received.unwrap_or(Err(SimError::Disposed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Table = PendingTable<u32, u32>;

    #[tokio::test]
    async fn complete_delivers_once() {
        let table = Table::new();
        let rx = table.insert(RequestId(1), 10).unwrap();

        assert_eq!(table.complete(RequestId(1), |m| Ok(m + 1)), Some(true));
        assert_eq!(table.complete(RequestId(1), |m| Ok(m + 2)), None);
        assert!(!table.cancel(RequestId(1)));

        assert_eq!(rx.await.unwrap().unwrap(), 11);
        assert_eq!(table.stats().completed, 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn cancel_then_complete_is_noop() {
        let table = Table::new();
        let rx = table.insert(RequestId(2), 0).unwrap();
        assert!(table.cancel(RequestId(2)));
        assert_eq!(table.complete(RequestId(2), |_| Ok(5)), None);
        assert!(matches!(rx.await.unwrap(), Err(SimError::Canceled)));
        assert_eq!(table.stats().canceled, 1);
        assert_eq!(table.stats().completed, 0);
    }

    #[tokio::test]
    async fn resolver_error_is_failure() {
        let table = Table::new();
        let rx = table.insert(RequestId(3), 0).unwrap();
        let outcome = table.complete(RequestId(3), |_| {
            Err(SimError::Truncated { need: 8, have: 2 })
        });
        assert_eq!(outcome, Some(false));
        assert!(matches!(rx.await.unwrap(), Err(SimError::Truncated { .. })));
        assert_eq!(table.stats().failed, 1);
    }

    #[tokio::test]
    async fn fail_by_send_id() {
        let table = Table::new();
        let rx = table.insert(RequestId(4), 0).unwrap();
        table.bind_send(RequestId(4), SendId(40));

        assert_eq!(table.fail_send(SendId(41), SimError::Canceled), None);
        let err = SimError::Exception {
            code: 3,
            send_id: SendId(40),
            index: 0,
        };
        assert_eq!(table.fail_send(SendId(40), err), Some(RequestId(4)));
        assert!(matches!(rx.await.unwrap(), Err(SimError::Exception { code: 3, .. })));
        assert_eq!(table.fail_send(SendId(40), SimError::Canceled), None);
    }

    #[tokio::test]
    async fn exception_ahead_of_binding_fails_on_bind() {
        let table = Table::new();
        let rx = table.insert(RequestId(8), 0).unwrap();
        let err = SimError::Exception {
            code: 7,
            send_id: SendId(80),
            index: 1,
        };

        assert_eq!(table.fail_send(SendId(80), err), None);
        assert_eq!(table.unclaimed(), 1);
        assert!(table.bind_send(RequestId(8), SendId(80)));
        assert_eq!(table.unclaimed(), 0);
        assert!(matches!(rx.await.unwrap(), Err(SimError::Exception { code: 7, index: 1, .. })));
        assert_eq!(table.stats().failed, 1);
    }

    #[test]
    fn parked_exceptions_are_bounded() {
        let table = Table::new();
        for send in 0..(UNCLAIMED_CAPACITY as u32 + 5) {
            assert_eq!(table.fail_send(SendId(send), SimError::Canceled), None);
        }
        assert_eq!(table.unclaimed(), UNCLAIMED_CAPACITY);

        // The oldest were dropped.
        let _rx = table.insert(RequestId(1), 0).unwrap();
        assert!(!table.bind_send(RequestId(1), SendId(0)));
        assert!(table.contains(RequestId(1)));

        table.cancel_all();
        assert_eq!(table.unclaimed(), 0);
    }

    #[tokio::test]
    async fn timeout_is_sticky() {
        let table = Table::new();
        let rx = table.insert(RequestId(5), 0).unwrap();
        let limit = Duration::from_millis(20);

        let result = await_reply(&table, RequestId(5), rx, Some(limit)).await;
        assert!(matches!(result, Err(SimError::Timeout(d)) if d == limit));

        // Late completion finds nothing.
        assert_eq!(table.complete(RequestId(5), |_| Ok(1)), None);
        assert_eq!(table.stats().timed_out, 1);
    }

    #[tokio::test]
    async fn await_reply_returns_completion() {
        let table = Arc::new(Table::new());
        let rx = table.insert(RequestId(6), 7).unwrap();

        let completer = Arc::clone(&table);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            completer.complete(RequestId(6), |m| Ok(m * 2));
        });

        let value = await_reply(&table, RequestId(6), rx, Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(value, 14);
    }

    #[tokio::test]
    async fn cancel_all_closes() {
        let table = Table::new();
        let a = table.insert(RequestId(7), 0).unwrap();
        let b = table.insert(RequestId(8), 0).unwrap();

        assert_eq!(table.cancel_all(), 2);
        assert!(matches!(a.await.unwrap(), Err(SimError::Canceled)));
        assert!(matches!(b.await.unwrap(), Err(SimError::Canceled)));
        assert!(matches!(table.insert(RequestId(9), 0), Err(SimError::Disposed)));
    }

    #[tokio::test]
    async fn dropped_waiter_releases_record() {
        let table = Table::new();
        let rx = table.insert(RequestId(11), 0).unwrap();
        let wait = await_reply(&table, RequestId(11), rx, Some(Duration::from_millis(500)));
        let _ = tokio::time::timeout(Duration::from_millis(1), wait).await;
        assert!(!table.contains(RequestId(11)));
        assert_eq!(table.stats().canceled, 1);
    }
}

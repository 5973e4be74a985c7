// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative cancellation signal.
//!
//! A [`CancelToken`] is shared between the party that may cancel and the
//! operations that should stop. Operations register a callback with
//! [`CancelToken::on_cancel`]; the returned [`CancelRegistration`]
//! unregisters it on drop.
//!
//! ```rust
//! use simlink::cancel::CancelToken;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let token = CancelToken::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! let _registration = token.on_cancel(move || flag.store(true, Ordering::SeqCst));
//!
//! token.clone().cancel();
//! assert!(fired.load(Ordering::SeqCst));
//! assert!(token.is_canceled());
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    canceled: AtomicBool,
    callbacks: Mutex<HashMap<u64, Callback>>,
    next_key: AtomicU64,
}

/// Cloneable cancellation signal.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and run every registered callback once.
    pub fn cancel(&self) {
        let callbacks = {
            let mut callbacks = self.inner.callbacks.lock();
            if self.inner.canceled.swap(true, Ordering::SeqCst) {
                return;
            }
            std::mem::take(&mut *callbacks)
        };
        for (_, callback) in callbacks {
            callback();
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Run `callback` when the token is canceled.
    ///
    /// If the token is already canceled the callback runs immediately, on
    /// the calling thread.
    pub fn on_cancel<F>(&self, callback: F) -> CancelRegistration
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks.lock();
        if self.inner.canceled.load(Ordering::SeqCst) {
            drop(callbacks);
            callback();
            return CancelRegistration {
                inner: Weak::new(),
                key: None,
            };
        }
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        callbacks.insert(key, Box::new(callback));
        CancelRegistration {
            inner: Arc::downgrade(&self.inner),
            key: Some(key),
        }
    }

    #[cfg(test)]
    fn registered(&self) -> usize {
        self.inner.callbacks.lock().len()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("canceled", &self.is_canceled())
            .finish()
    }
}

/// Keeps a cancellation callback registered; dropping it unregisters.
#[must_use = "dropping the registration unregisters the callback"]
pub struct CancelRegistration {
    inner: Weak<Inner>,
    key: Option<u64>,
}

impl Drop for CancelRegistration {
    fn drop(&mut self) {
        if let (Some(key), Some(inner)) = (self.key, self.inner.upgrade()) {
            inner.callbacks.lock().remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn callbacks_run_once() {
        let token = CancelToken::new();
        let (count, callback) = counter();
        let _reg = token.on_cancel(callback);

        token.cancel();
        token.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn already_canceled_runs_immediately() {
        let token = CancelToken::new();
        token.cancel();

        let (count, callback) = counter();
        let _reg = token.on_cancel(callback);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(token.registered(), 0);
    }

    #[test]
    fn dropped_registration_does_not_fire() {
        let token = CancelToken::new();
        let (count, callback) = counter();
        drop(token.on_cancel(callback));
        assert_eq!(token.registered(), 0);

        token.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel();
        assert!(token.is_canceled());
    }
}

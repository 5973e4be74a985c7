// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Definition cache for scalar fields.
//!
//! Maps a `(name, unit)` pair to the native definition registered for it.
//! A hit never touches the native layer. A miss takes a per-key slot lock,
//! re-checks the cache and only then registers, so concurrent first-time
//! callers for one key share a single native registration while callers of
//! different keys never wait on each other. Failed registrations are not
//! cached.
//!
//! Entries are never evicted. The cache logs a warning once its size
//! crosses the configured threshold.

use crate::error::{Result, SimError};
use crate::logging::Logger;
use crate::native::NativeService;
use crate::schema::{DataType, FieldSchema};
use crate::DefinitionId;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Cache key: field name (case-folded) and unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    name: String,
    unit: String,
}

impl DefinitionKey {
    pub fn new(name: &str, unit: &str) -> Self {
        Self {
            name: name.trim().to_ascii_uppercase(),
            unit: unit.trim().to_ascii_lowercase(),
        }
    }

    pub fn of(schema: &FieldSchema) -> Self {
        Self::new(&schema.name, &schema.unit)
    }
}

/// A registered definition and the data type it was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub id: DefinitionId,
    pub data_type: DataType,
}

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupStats {
    pub hits: u64,
    pub misses: u64,
    pub registrations: u64,
}

/// Per-connection `(name, unit)` → definition cache.
pub struct DefinitionCache {
    native: Arc<dyn NativeService>,
    entries: DashMap<DefinitionKey, Registered>,
    slots: DashMap<DefinitionKey, Arc<Mutex<()>>>,
    next_id: AtomicU32,
    base: u32,
    warn_threshold: usize,
    warned: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    registrations: AtomicU64,
    log: Logger,
}

impl DefinitionCache {
    /// Create a cache minting identifiers from `base` upwards.
    pub fn new(
        native: Arc<dyn NativeService>,
        base: u32,
        warn_threshold: usize,
        log: Logger,
    ) -> Self {
        Self {
            native,
            entries: DashMap::new(),
            slots: DashMap::new(),
            next_id: AtomicU32::new(base),
            base,
            warn_threshold,
            warned: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
            log,
        }
    }

    /// Return the definition for `schema`, registering it on first use.
    pub fn ensure(&self, schema: &FieldSchema) -> Result<Registered> {
        let key = DefinitionKey::of(schema);
        if let Some(hit) = self.lookup_key(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        let slot = Arc::clone(self.slots.entry(key.clone()).or_default().value());
        let _turn = slot.lock();
        if let Some(hit) = self.lookup_key(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let id = DefinitionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.native
            .add_to_definition(id, &schema.name, &schema.unit, schema.data_type)
            .map_err(|code| {
                self.log.warn(format_args!(
                    "registering '{}' ({}) as {} failed: {}",
                    schema.name, schema.unit, id, code
                ));
                SimError::native("AddToDataDefinition", code)
            })?;
        self.registrations.fetch_add(1, Ordering::Relaxed);

        let registered = Registered {
            id,
            data_type: schema.data_type,
        };
        self.entries.insert(key.clone(), registered);
        // Late waiters still hold their clone and will see the entry.
        self.slots.remove(&key);

        self.log.debug(format_args!(
            "registered '{}' ({}) as {} [{}]",
            schema.name, schema.unit, id, schema.data_type
        ));
        self.check_growth();
        Ok(registered)
    }

    /// Cached definition for `(name, unit)`, without registering.
    pub fn lookup(&self, name: &str, unit: &str) -> Option<Registered> {
        self.lookup_key(&DefinitionKey::new(name, unit))
    }

    fn lookup_key(&self, key: &DefinitionKey) -> Option<Registered> {
        self.entries.get(key).map(|entry| *entry.value())
    }

    fn check_growth(&self) {
        if self.warn_threshold == 0 || self.entries.len() < self.warn_threshold {
            return;
        }
        if !self.warned.swap(true, Ordering::Relaxed) {
            self.log.warn(format_args!(
                "definition cache holds {} entries; entries are never evicted",
                self.entries.len()
            ));
        }
    }

    /// Forget every registration (connection teardown).
    pub fn invalidate(&self) {
        self.entries.clear();
        self.slots.clear();
        self.warned.store(false, Ordering::Relaxed);
    }

    /// First identifier this cache mints.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LookupStats {
        LookupStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for DefinitionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionCache")
            .field("entries", &self.len())
            .field("base", &self.base)
            .finish()
    }
}

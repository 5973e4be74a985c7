// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-keyed schema table.
//!
//! Reads go through an `ArcSwap` snapshot (no lock); writes clone the
//! table and swap it in. Registration happens at startup or on explicit
//! extension, so the copy cost is paid rarely.

use super::{builtins, FieldSchema};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Case-insensitive registry of field schemas.
pub struct SchemaRegistry {
    entries: ArcSwap<HashMap<String, Arc<FieldSchema>>>,
}

static GLOBAL: OnceLock<Arc<SchemaRegistry>> = OnceLock::new();

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

impl SchemaRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Registry populated with the built-in aviation variables.
    pub fn with_builtins() -> Self {
        let table: HashMap<String, Arc<FieldSchema>> = builtins::schemas()
            .map(|schema| (normalize(&schema.name), Arc::new(schema)))
            .collect();
        Self {
            entries: ArcSwap::from_pointee(table),
        }
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> Arc<SchemaRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Register or replace a schema. The last registration for a name wins.
    pub fn register(&self, schema: FieldSchema) {
        let key = normalize(&schema.name);
        let schema = Arc::new(schema);
        self.entries.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(key.clone(), Arc::clone(&schema));
            next
        });
    }

    /// Look up a schema.
    ///
    /// An indexed name such as `"GENERAL ENG RPM:2"` falls back to the
    /// entry for `"GENERAL ENG RPM"` when no exact entry exists; the returned
    /// schema then carries the full indexed name.
    pub fn get(&self, name: &str) -> Option<Arc<FieldSchema>> {
        let entries = self.entries.load();
        let key = normalize(name);
        if let Some(schema) = entries.get(&key) {
            return Some(Arc::clone(schema));
        }

        let (base, index) = key.rsplit_once(':')?;
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let base = entries.get(base.trim_end())?;
        let mut indexed = FieldSchema::clone(base);
        indexed.name = name.trim().to_string();
        Some(Arc::new(indexed))
    }

    /// Check whether a name resolves to a schema.
    pub fn is_registered(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// True if no schema is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// All registered names (normalized), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

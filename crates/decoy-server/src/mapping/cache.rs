//! In-memory mapping table.
//!
//! One `parking_lot::RwLock` guards the whole table. Request matching takes the
//! read side; registration and reconciliation take the write side, so a reader
//! never observes a partially applied update.

use super::matcher::CompiledRule;
use super::request::MockRequest;
use super::resolver::resolve;
use super::types::{Mapping, MappingError};
use crate::metrics;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Table keyed by mapping name. Ordered so that scans run in name order.
pub type MappingTable = BTreeMap<String, Arc<CachedMapping>>;

/// A validated mapping together with its compiled matcher.
#[derive(Debug)]
pub struct CachedMapping {
    mapping: Mapping,
    compiled: CompiledRule,
}

impl CachedMapping {
    /// Validate a mapping and compile its rule.
    pub fn new(mapping: Mapping) -> Result<Self, MappingError> {
        mapping.validate()?;
        let compiled = CompiledRule::compile(mapping.rule())?;
        Ok(Self { mapping, compiled })
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn compiled(&self) -> &CompiledRule {
        &self.compiled
    }

    pub fn name(&self) -> &str {
        self.mapping.name()
    }

    pub fn update_time(&self) -> DateTime<Utc> {
        self.mapping.update_time()
    }
}

/// Concurrent name -> mapping table.
#[derive(Debug, Default)]
pub struct MappingCache {
    table: RwLock<MappingTable>,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Mapping> {
        self.table
            .read()
            .get(name)
            .map(|entry| entry.mapping().clone())
    }

    /// All mappings, oldest update first (name breaks ties)
    pub fn list(&self) -> Vec<Mapping> {
        let mut mappings: Vec<Mapping> = self
            .table
            .read()
            .values()
            .map(|entry| entry.mapping().clone())
            .collect();
        mappings.sort_by(|a, b| {
            a.update_time()
                .cmp(&b.update_time())
                .then_with(|| a.name().cmp(b.name()))
        });
        mappings
    }

    /// Insert or replace by name.
    pub fn put(&self, entry: CachedMapping) {
        let mut table = self.table.write();
        table.insert(entry.name().to_string(), Arc::new(entry));
        metrics::set_cached_mappings(table.len());
    }

    pub fn clear(&self) {
        let mut table = self.table.write();
        table.clear();
        metrics::set_cached_mappings(0);
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Run `f` with exclusive access to the table. Everything `f` does becomes
    /// visible to readers at once.
    pub fn update<R>(&self, f: impl FnOnce(&mut MappingTable) -> R) -> R {
        let mut table = self.table.write();
        let result = f(&mut table);
        metrics::set_cached_mappings(table.len());
        result
    }

    /// Find the winning mapping for a request under a single read lock.
    pub fn find_winner(&self, request: &MockRequest) -> Option<Arc<CachedMapping>> {
        let table = self.table.read();
        let winner = resolve(
            table
                .values()
                .filter(|entry| entry.compiled().matches(request))
                .map(|entry| entry.mapping()),
        )?;
        table.get(winner.name()).cloned()
    }
}

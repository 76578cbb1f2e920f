//! Cache/store reconciliation.
//!
//! A sync pass merges the remote collection into the local cache with
//! last-writer-wins semantics on `update_time`:
//!
//! - a remote copy strictly newer than the local one replaces it
//! - otherwise the local copy stays and is written back to the store
//! - remote mappings absent locally are adopted
//!
//! Nothing is ever purged from the cache by a sync. The merge is applied under
//! one cache write lock; store writes happen after the lock is released.

use crate::mapping::{CachedMapping, Mapping, MappingCache, MappingTable};
use crate::metrics;
use crate::store::{Document, DocumentStore};
use parking_lot::Mutex;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Counters describing one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Documents returned by the store
    pub fetched: usize,
    /// Documents that could not be parsed or validated
    pub skipped: usize,
    /// Remote mappings added to the cache
    pub adopted: usize,
    /// Local mappings replaced by a newer remote copy
    pub updated: usize,
    /// Local mappings written back to the store
    pub written: usize,
    pub write_failures: usize,
    /// The fetch failed and the pass did nothing
    pub fetch_failed: bool,
}

/// Outcome of merging remote mappings into the table.
#[derive(Debug, Default)]
struct MergeOutcome {
    adopted: usize,
    updated: usize,
    to_write: Vec<Mapping>,
}

pub struct Reconciler {
    store: Option<Arc<dyn DocumentStore>>,
    /// Serializes sync and reset passes issued through this reconciler
    pass_lock: Mutex<()>,
}

impl Reconciler {
    pub fn new(store: Option<Arc<dyn DocumentStore>>) -> Self {
        Self {
            store,
            pass_lock: Mutex::new(()),
        }
    }

    /// Reconciler with no backing store; every sync is a no-op.
    pub fn cache_only() -> Self {
        Self::new(None)
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend(&self) -> &'static str {
        self.store.as_ref().map_or("none", |store| store.backend())
    }

    /// Run one reconciliation pass between `cache` and the store.
    ///
    /// Store failures are logged and counted, never returned.
    pub fn sync(&self, cache: &MappingCache) -> SyncReport {
        let Some(store) = self.store.as_ref() else {
            return SyncReport::default();
        };
        let _pass = self.pass_lock.lock();
        let mut report = SyncReport::default();

        let documents = match store.fetch_all() {
            Ok(documents) => {
                metrics::record_store_op("fetch", true);
                documents
            }
            Err(e) => {
                metrics::record_store_op("fetch", false);
                metrics::record_sync_pass("fetch_failed");
                warn!(
                    "Sync aborted: fetching from {} store failed: {:#}",
                    store.backend(),
                    e
                );
                report.fetch_failed = true;
                return report;
            }
        };
        report.fetched = documents.len();

        let remote = parse_documents(documents, &mut report);
        let outcome = cache.update(|table| merge(table, remote));
        report.adopted = outcome.adopted;
        report.updated = outcome.updated;

        for mapping in &outcome.to_write {
            if write_mapping(store.as_ref(), mapping) {
                report.written += 1;
            } else {
                report.write_failures += 1;
            }
        }

        metrics::record_sync_pass("ok");
        if report.adopted > 0 || report.updated > 0 || report.skipped > 0 {
            info!(
                "Sync with {} store: fetched={} adopted={} updated={} skipped={} written={} write_failures={}",
                store.backend(),
                report.fetched,
                report.adopted,
                report.updated,
                report.skipped,
                report.written,
                report.write_failures
            );
        } else {
            debug!(
                "Sync with {} store: fetched={} written={} write_failures={}",
                store.backend(),
                report.fetched,
                report.written,
                report.write_failures
            );
        }
        report
    }

    /// Clear the cache and delete every stored document.
    ///
    /// Returns the number of mappings removed from the cache.
    pub fn reset(&self, cache: &MappingCache) -> usize {
        let _pass = self.pass_lock.lock();
        let cleared = cache.update(|table| {
            let count = table.len();
            table.clear();
            count
        });

        if let Some(store) = self.store.as_ref() {
            let ids = match store.list_ids() {
                Ok(ids) => {
                    metrics::record_store_op("list", true);
                    ids
                }
                Err(e) => {
                    metrics::record_store_op("list", false);
                    warn!(
                        "Reset: listing {} store documents failed: {:#}",
                        store.backend(),
                        e
                    );
                    Vec::new()
                }
            };

            let mut deleted = 0;
            for id in &ids {
                match store.delete(id) {
                    Ok(()) => {
                        metrics::record_store_op("delete", true);
                        deleted += 1;
                    }
                    Err(e) => {
                        metrics::record_store_op("delete", false);
                        warn!("Reset: deleting document {} failed: {:#}", id, e);
                    }
                }
            }
            info!(
                "Reset: cleared {} cached mappings, deleted {}/{} stored documents",
                cleared,
                deleted,
                ids.len()
            );
        } else {
            info!("Reset: cleared {} cached mappings", cleared);
        }
        cleared
    }
}

/// Parse stored documents into validated mappings keyed by recomputed name.
/// When two documents carry the same rule the newer one is kept.
fn parse_documents(
    documents: Vec<Document>,
    report: &mut SyncReport,
) -> BTreeMap<String, CachedMapping> {
    let mut remote: BTreeMap<String, CachedMapping> = BTreeMap::new();
    for document in documents {
        let mapping: Mapping = match serde_json::from_str(&document.body) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!("Skipping unparseable document {}: {}", document.id, e);
                report.skipped += 1;
                continue;
            }
        };
        let entry = match CachedMapping::new(mapping) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping invalid document {}: {}", document.id, e);
                report.skipped += 1;
                continue;
            }
        };
        if entry.name() != document.id {
            debug!(
                "Document {} holds mapping {}, using the computed name",
                document.id,
                entry.name()
            );
        }

        match remote.entry(entry.name().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => {
                if entry.update_time() > slot.get().update_time() {
                    slot.insert(entry);
                }
            }
        }
    }
    remote
}

/// Merge remote mappings into the table. Runs under the cache write lock.
fn merge(table: &mut MappingTable, mut remote: BTreeMap<String, CachedMapping>) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (name, local) in table.iter_mut() {
        match remote.remove(name) {
            Some(copy) if copy.update_time() > local.update_time() => {
                *local = Arc::new(copy);
                outcome.updated += 1;
            }
            _ => outcome.to_write.push(local.mapping().clone()),
        }
    }

    for (name, copy) in remote {
        if let Entry::Vacant(slot) = table.entry(name) {
            slot.insert(Arc::new(copy));
            outcome.adopted += 1;
        }
    }

    outcome
}

fn write_mapping(store: &dyn DocumentStore, mapping: &Mapping) -> bool {
    let body = match serde_json::to_string(mapping) {
        Ok(body) => body,
        Err(e) => {
            warn!("Could not serialize mapping {}: {}", mapping.name(), e);
            return false;
        }
    };
    match store.put(mapping.name(), &body) {
        Ok(()) => {
            metrics::record_store_op("put", true);
            true
        }
        Err(e) => {
            metrics::record_store_op("put", false);
            warn!(
                "Writing mapping {} to {} store failed: {:#}",
                mapping.name(),
                store.backend(),
                e
            );
            false
        }
    }
}

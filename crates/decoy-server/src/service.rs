//! MockService - the registration/matching facade.
//!
//! Owns the mapping cache and the reconciler. Every public operation syncs
//! with the store first so that instances sharing a store converge.

use crate::mapping::{
    CachedMapping, Mapping, MappingCache, MappingError, MappingRequest, MockRequest, Response,
};
use crate::metrics;
use crate::reconcile::{Reconciler, SyncReport};
use crate::config::StoreConfig;
use crate::store::{create_document_store_or_degrade, DocumentStore};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

pub struct MockService {
    cache: MappingCache,
    reconciler: Reconciler,
}

impl MockService {
    /// Create a service mirrored to `store`, or cache-only when `None`.
    pub fn new(store: Option<Arc<dyn DocumentStore>>) -> Self {
        Self {
            cache: MappingCache::new(),
            reconciler: Reconciler::new(store),
        }
    }

    /// Open the configured store and load its mappings.
    ///
    /// Store setup and the first sync do blocking I/O, so they run on the
    /// blocking thread pool.
    pub async fn start(config: StoreConfig) -> anyhow::Result<(Arc<Self>, SyncReport)> {
        tokio::task::spawn_blocking(move || {
            let service = Arc::new(Self::new(create_document_store_or_degrade(&config)));
            let report = service.sync();
            (service, report)
        })
        .await
        .context("Initial store sync failed")
    }

    /// Cache-only service
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn cache(&self) -> &MappingCache {
        &self.cache
    }

    pub fn store_backend(&self) -> &'static str {
        self.reconciler.backend()
    }

    /// Run a reconciliation pass on demand.
    pub fn sync(&self) -> SyncReport {
        self.reconciler.sync(&self.cache)
    }

    /// Register a mapping, replacing any mapping with the same rule.
    ///
    /// The request is validated and compiled before anything is touched, so a
    /// rejected registration leaves cache and store unchanged.
    pub fn register(&self, request: MappingRequest) -> Result<Mapping, MappingError> {
        let entry = match CachedMapping::new(request.into_mapping(Utc::now())) {
            Ok(entry) => entry,
            Err(e) => {
                metrics::record_registration("rejected");
                return Err(e);
            }
        };
        let mapping = entry.mapping().clone();

        self.reconciler.sync(&self.cache);
        self.cache.put(entry);
        self.reconciler.sync(&self.cache);

        metrics::record_registration("accepted");
        info!(
            "Registered mapping {} (priority={}, status={})",
            mapping.name(),
            mapping.priority(),
            mapping.response().status_code
        );
        Ok(mapping)
    }

    /// All mappings, oldest update first.
    pub fn list(&self) -> Vec<Mapping> {
        self.reconciler.sync(&self.cache);
        self.cache.list()
    }

    /// Remove every mapping from cache and store. Returns the number of
    /// mappings removed from the cache.
    pub fn reset(&self) -> usize {
        self.reconciler.reset(&self.cache)
    }

    /// Response of the winning mapping, or `None` when nothing matches.
    pub fn match_request(&self, request: &MockRequest) -> Option<Response> {
        self.reconciler.sync(&self.cache);
        match self.cache.find_winner(request) {
            Some(winner) => {
                metrics::record_request("matched");
                debug!(
                    "{} {} matched mapping {}",
                    request.method,
                    request.path,
                    winner.name()
                );
                Some(winner.mapping().response().clone())
            }
            None => {
                metrics::record_request("unmatched");
                debug!("{} {} matched no mapping", request.method, request.path);
                None
            }
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use crate::mapping::Rule;
    use crate::store::InMemoryDocumentStore;

    fn request(rule: Rule, body: &str) -> MappingRequest {
        MappingRequest::new(rule, Response::text(0, body))
    }

    #[test]
    fn test_register_and_match() {
        let service = MockService::in_memory();
        let mapping = service
            .register(request(Rule::with_path("/hello"), "hi"))
            .unwrap();
        assert_eq!(mapping.response().status_code, 200);

        let response = service
            .match_request(&MockRequest::new("GET", "/hello"))
            .unwrap();
        assert_eq!(response.text_body, "hi");
        assert!(service
            .match_request(&MockRequest::new("GET", "/other"))
            .is_none());
    }

    #[test]
    fn test_rejected_registration_changes_nothing() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = MockService::new(Some(store.clone()));
        let mut rule = Rule::with_path("/a");
        rule.path_regex = "^/a".to_string();

        let err = service.register(request(rule, "x")).unwrap_err();
        assert!(matches!(err, MappingError::ConflictingPath));
        assert!(service.cache().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let service = MockService::in_memory();
        let mut rule = Rule::with_path("/a");
        rule.text_body_regex = "[".to_string();
        let err = service.register(request(rule, "x")).unwrap_err();
        assert!(matches!(
            err,
            MappingError::InvalidRegex {
                field: "text_body_regex",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_status_rejected() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = MockService::new(Some(store.clone()));
        let request = MappingRequest::new(Rule::with_path("/a"), Response::text(42, "x"));

        let err = service.register(request).unwrap_err();
        assert!(matches!(err, MappingError::InvalidStatus(42)));
        assert!(service.cache().is_empty());
        assert!(store.is_empty());

        let request = MappingRequest::new(Rule::with_path("/a"), Response::text(0, "x"));
        assert_eq!(service.register(request).unwrap().response().status_code, 200);
    }

    #[test]
    fn test_registration_is_persisted() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = MockService::new(Some(store.clone()));
        let mapping = service.register(request(Rule::with_path("/p"), "p")).unwrap();

        let stored: Mapping = serde_json::from_str(&store.get(mapping.name()).unwrap()).unwrap();
        assert_eq!(stored, mapping);
        assert_eq!(service.store_backend(), "inmemory");
    }

    #[test]
    fn test_instances_sharing_a_store_converge() {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let first = MockService::new(Some(Arc::clone(&store)));
        let second = MockService::new(Some(Arc::clone(&store)));

        first
            .register(request(Rule::with_path("/shared"), "v1"))
            .unwrap();
        let response = second
            .match_request(&MockRequest::new("GET", "/shared"))
            .unwrap();
        assert_eq!(response.text_body, "v1");

        second
            .register(request(Rule::with_path("/shared"), "v2"))
            .unwrap();
        let listed = first.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].response().text_body, "v2");
    }

    #[test]
    fn test_reset_clears_everything() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = MockService::new(Some(store.clone()));
        service.register(request(Rule::with_path("/a"), "a")).unwrap();
        service.register(request(Rule::with_path("/b"), "b")).unwrap();

        assert_eq!(service.reset(), 2);
        assert!(service.list().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_is_ordered_by_update_time() {
        let service = MockService::in_memory();
        service.register(request(Rule::with_path("/z"), "z")).unwrap();
        service.register(request(Rule::with_path("/a"), "a")).unwrap();
        let paths: Vec<_> = service
            .list()
            .iter()
            .map(|m| m.rule().path.clone())
            .collect();
        assert_eq!(paths, vec!["/z", "/a"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_start_loads_stored_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::File,
            path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let (first, _) = MockService::start(config.clone()).await.unwrap();
        first.register(request(Rule::with_path("/kept"), "kept")).unwrap();

        let (second, report) = MockService::start(config).await.unwrap();
        assert_eq!(second.store_backend(), "file");
        assert_eq!(report.adopted, 1);
        assert!(second
            .cache()
            .find_winner(&MockRequest::new("GET", "/kept"))
            .is_some());
    }
}

use super::{Document, DocumentStore};
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// In-memory implementation of DocumentStore
///
/// Documents live only as long as the process. Several services sharing one
/// instance (through an `Arc`) behave like instances sharing a remote store,
/// which is how the reconciliation tests use it.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<String, String>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw body of a document, if present
    pub fn get(&self, id: &str) -> Option<String> {
        self.documents.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.lock().is_empty()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn backend(&self) -> &'static str {
        "inmemory"
    }

    fn fetch_all(&self) -> Result<Vec<Document>> {
        let documents = self.documents.lock();
        Ok(documents
            .iter()
            .map(|(id, body)| Document::new(id.clone(), body.clone()))
            .collect())
    }

    fn put(&self, id: &str, body: &str) -> Result<()> {
        self.documents
            .lock()
            .insert(id.to_string(), body.to_string());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.documents.lock().remove(id);
        Ok(())
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.documents.lock().keys().cloned().collect())
    }
}

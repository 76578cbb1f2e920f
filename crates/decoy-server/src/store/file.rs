use super::{Document, DocumentStore};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSION: &str = "json";

/// Directory-backed implementation of DocumentStore
///
/// Each document is a `<id>.json` file under `<root>/<collection>`. Useful for
/// single-host deployments that need mappings to survive restarts.
#[derive(Debug)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    /// Create the store, creating the collection directory if needed.
    pub fn new(root: &Path, collection: &str) -> Result<Self> {
        let dir = root.join(collection);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, id: &str) -> Result<PathBuf> {
        if !is_valid_id(id) {
            bail!("Invalid document id: {id:?}");
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    fn document_ids(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read store directory {}", self.dir.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Skipping unreadable directory entry: {}", e);
                    continue;
                }
            };
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if is_valid_id(stem) => ids.push(stem.to_string()),
                _ => debug!("Ignoring {} in store directory", path.display()),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Ids double as file names, so they cannot be empty, hidden or path-like.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && !id.contains(['/', '\\']) && !id.starts_with('.')
}

impl DocumentStore for FileDocumentStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    fn fetch_all(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for id in self.document_ids()? {
            let path = match self.document_path(&id) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping document: {}", e);
                    continue;
                }
            };
            match fs::read_to_string(&path) {
                Ok(body) => documents.push(Document::new(id, body)),
                Err(e) => warn!("Could not read document {}: {}", path.display(), e),
            }
        }
        debug!(
            "Read {} documents from {}",
            documents.len(),
            self.dir.display()
        );
        Ok(documents)
    }

    fn put(&self, id: &str, body: &str) -> Result<()> {
        let path = self.document_path(id)?;
        // Write then rename so readers never see a truncated document
        let tmp = self.dir.join(format!(".{id}.tmp"));
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move document into {}", path.display()))?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.document_path(id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    fn list_ids(&self) -> Result<Vec<String>> {
        self.document_ids()
    }
}

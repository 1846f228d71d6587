//! Persistence of project documents.
//!
//! Everything for a project lives in one [`ProjectState`] blob that is always
//! written whole. The file backend keeps every project in a single JSON
//! document shaped `{ "projects": { "<id>": { ... } } }`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::session::ProjectState;

pub const DOCUMENT_FILE: &str = "projects.json";

/// Load and save project blobs by id.
pub trait SessionStore {
    fn load(&self, project_id: &str) -> Result<Option<ProjectState>, StoreError>;
    fn save(&self, project_id: &str, state: &ProjectState) -> Result<(), StoreError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn load(&self, project_id: &str) -> Result<Option<ProjectState>, StoreError> {
        (**self).load(project_id)
    }

    fn save(&self, project_id: &str, state: &ProjectState) -> Result<(), StoreError> {
        (**self).save(project_id, state)
    }
}

/// Reject ids that would not be safe as storage keys.
pub fn validate_project_id(project_id: &str) -> Result<(), StoreError> {
    let valid = (1..=128).contains(&project_id.len())
        && project_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidProjectId(project_id.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    projects: RwLock<BTreeMap<String, ProjectState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, project_id: &str) -> Result<Option<ProjectState>, StoreError> {
        validate_project_id(project_id)?;
        Ok(self.projects.read().get(project_id).cloned())
    }

    fn save(&self, project_id: &str, state: &ProjectState) -> Result<(), StoreError> {
        validate_project_id(project_id)?;
        self.projects
            .write()
            .insert(project_id.to_string(), state.clone());
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    projects: BTreeMap<String, ProjectState>,
}

/// JSON file under a root directory.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Store rooted at `root`; the directory is created on first save.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(DOCUMENT_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Document, StoreError> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let text = fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Document::default());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl SessionStore for FileStore {
    fn load(&self, project_id: &str) -> Result<Option<ProjectState>, StoreError> {
        validate_project_id(project_id)?;
        let mut document = self.read_document()?;
        Ok(document.projects.remove(project_id))
    }

    fn save(&self, project_id: &str, state: &ProjectState) -> Result<(), StoreError> {
        validate_project_id(project_id)?;
        let _guard = self.write_lock.lock();
        let mut document = self.read_document()?;
        document
            .projects
            .insert(project_id.to_string(), state.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&document)?)?;
        debug!(project = project_id, path = %self.path.display(), "project saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_category(name: &str) -> ProjectState {
        let mut state = ProjectState::default();
        state.categories.push(name.to_string());
        state
    }

    #[test]
    fn test_project_id_validation() {
        assert!(validate_project_id("default").is_ok());
        assert!(validate_project_id("team.api-v2_x").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("../etc").is_err());
        assert!(validate_project_id("a b").is_err());
        assert!(validate_project_id(&"a".repeat(129)).is_err());
        assert!(validate_project_id(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.load("p").unwrap().is_none());

        store.save("p", &state_with_category("Users")).unwrap();
        let loaded = store.load("p").unwrap().unwrap();
        assert_eq!(loaded.categories, vec!["Users".to_string()]);
        assert!(matches!(
            store.save("bad id", &ProjectState::default()),
            Err(StoreError::InvalidProjectId(_))
        ));
    }

    #[test]
    fn test_file_store_keeps_projects_separate() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));
        assert!(store.load("a").unwrap().is_none());

        store.save("a", &state_with_category("A")).unwrap();
        store.save("b", &state_with_category("B")).unwrap();
        store.save("a", &state_with_category("A2")).unwrap();

        let reopened = FileStore::new(dir.path().join("nested"));
        assert_eq!(reopened.load("a").unwrap().unwrap().categories, vec!["A2".to_string()]);
        assert_eq!(reopened.load("b").unwrap().unwrap().categories, vec!["B".to_string()]);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert!(raw["projects"]["a"]["sessions"].is_object());
    }

    #[test]
    fn test_file_store_rejects_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DOCUMENT_FILE), "{not json").unwrap();
        let store = FileStore::new(dir.path());
        assert!(matches!(store.load("a"), Err(StoreError::Serde(_))));
    }
}

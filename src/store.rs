//! Durable storage of projects and global settings.
//!
//! Everything persists as one JSON blob shaped like [`StoredData`]. The
//! discipline is read-entire-blob, mutate-in-memory, write-entire-blob; there
//! is no locking, so concurrent writers from separate processes can race.
//! That limitation is accepted: a single operator surface mutates state at a
//! time.
//!
//! Reads are availability-over-durability: an absent or corrupted backing
//! store falls back to the empty default dataset instead of failing the
//! caller. Writes do surface errors ([`GridError::Storage`]).
//!
//! There is no schema versioning or migration mechanism; a schema change is a
//! hard compatibility break.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{GridError, Result};
use crate::types::{Language, Project, StoredData};

/// Raw payload storage the [`PersistenceStore`] serializes into.
///
/// Abstracting the byte-level backing keeps the store testable and lets
/// embedders supply their own medium (file, browser storage bridge, memory).
pub trait StorageBackend: Send + Sync + 'static {
    /// Read the whole payload; `Ok(None)` when nothing was ever written.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the whole payload.
    fn write(&self, payload: &str) -> Result<()>;
}

/// File-backed storage under a fixed path.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GridError::storage(self.path.clone(), e)),
        }
    }

    fn write(&self, payload: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GridError::storage(self.path.clone(), e))?;
        }
        std::fs::write(&self.path, payload).map_err(|e| GridError::storage(self.path.clone(), e))
    }
}

/// In-memory storage. Clones share the same cell; useful for tests and
/// embedders that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    cell: std::sync::Arc<Mutex<Option<String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw payload, if any. Intended for assertions in tests.
    pub fn snapshot(&self) -> Option<String> {
        self.cell.lock().ok().and_then(|guard| guard.clone())
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.cell.lock().map(|guard| guard.clone()).unwrap_or(None))
    }

    fn write(&self, payload: &str) -> Result<()> {
        if let Ok(mut guard) = self.cell.lock() {
            *guard = Some(payload.to_string());
        }
        Ok(())
    }
}

/// Durable key-value store of all projects and global settings.
pub struct PersistenceStore {
    backend: Box<dyn StorageBackend>,
}

impl PersistenceStore {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// File-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileBackend::new(path)))
    }

    /// Volatile in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Load the full dataset, falling back to the empty default when the
    /// backing store is absent, unreadable, or corrupted.
    pub fn load(&self) -> StoredData {
        match self.backend.read() {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(data) => data,
                Err(e) => {
                    warn!("stored data is corrupted, starting from defaults: {e}");
                    StoredData::default()
                }
            },
            Ok(None) => StoredData::default(),
            Err(e) => {
                warn!("stored data is unreadable, starting from defaults: {e}");
                StoredData::default()
            }
        }
    }

    /// Persist the full dataset.
    pub fn save(&self, data: &StoredData) -> Result<()> {
        let payload = serde_json::to_string(data).map_err(|e| {
            GridError::storage(
                PathBuf::from("<serialize>"),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        self.backend.write(&payload)
    }

    /// All stored projects.
    pub fn projects(&self) -> Vec<Project> {
        self.load().projects
    }

    /// One project by id.
    pub fn project(&self, id: &str) -> Option<Project> {
        self.load().projects.into_iter().find(|p| p.id == id)
    }

    /// Upsert a project by id, stamping `updated_at = now_ms`.
    /// Returns the stored form.
    pub fn save_project(&self, mut project: Project, now_ms: i64) -> Result<Project> {
        project.updated_at = now_ms;

        let mut data = self.load();
        match data.projects.iter_mut().find(|p| p.id == project.id) {
            Some(slot) => *slot = project.clone(),
            None => data.projects.push(project.clone()),
        }
        self.save(&data)?;

        debug!(project_id = %project.id, "project persisted");
        Ok(project)
    }

    /// Remove a project; clears `current_project_id` if it pointed there.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        let mut data = self.load();
        data.projects.retain(|p| p.id != id);
        if data.settings.current_project_id.as_deref() == Some(id) {
            data.settings.current_project_id = None;
        }
        self.save(&data)
    }

    /// Project pointed at by `current_project_id`, if any.
    pub fn current_project(&self) -> Option<Project> {
        let data = self.load();
        let id = data.settings.current_project_id?;
        data.projects.into_iter().find(|p| p.id == id)
    }

    /// Update the current-project pointer.
    pub fn set_current_project(&self, id: Option<&str>) -> Result<()> {
        let mut data = self.load();
        data.settings.current_project_id = id.map(str::to_string);
        self.save(&data)
    }

    /// Update the stored UI language.
    pub fn save_language(&self, language: Language) -> Result<()> {
        let mut data = self.load();
        data.settings.language = language;
        self.save(&data)
    }

    /// Stored UI language.
    pub fn language(&self) -> Language {
        self.load().settings.language
    }
}

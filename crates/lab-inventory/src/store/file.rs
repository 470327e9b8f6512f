//! Project and hardware set persistence as JSON documents.
//!
//! One file per record under a directory tree:
//!
//! ```text
//! {base_dir}/
//! ├── projects/         — one document per project
//! │   └── {bs58(name)}.json
//! └── hwsets/           — one document per hardware set
//!     └── {id}.json
//! ```
//!
//! Project names are free text, so their file stems are base58-encoded.
//! Hardware set ids are already restricted to a path-safe alphabet.
//!
//! File format for projects:
//! ```json
//! { "version": 1, "project": { ... Project ... } }
//! ```
//!
//! File format for hardware sets:
//! ```json
//! { "version": 1, "hwset": { ... HardwareSet ... } }
//! ```
//!
//! Documents are replaced by writing a sibling temp file and renaming it over
//! the original. Mutations hold an in-process lock for their whole
//! read-modify-write; a data directory must have a single writing process.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::model::{HardwareSet, HwSetId, Project};

use super::{plan_adjustment, AdjustOutcome, AllocationGuard, InventoryStore, MembershipChange};

// ── File format constants ─────────────────────────────────────────────────────

const INVENTORY_FILE_VERSION: u32 = 1;

const PROJECTS_DIR: &str = "projects";
const HWSETS_DIR: &str = "hwsets";

// ── On-disk structures ────────────────────────────────────────────────────────

/// Wrapper written to disk for each project.
#[derive(Debug, Serialize, Deserialize)]
struct ProjectFile {
    version: u32,
    project: Project,
}

/// Wrapper written to disk for each hardware set.
#[derive(Debug, Serialize, Deserialize)]
struct HwSetFile {
    version: u32,
    hwset: HardwareSet,
}

/// A versioned on-disk wrapper.
trait Document: DeserializeOwned {
    fn version(&self) -> u32;
}

impl Document for ProjectFile {
    fn version(&self) -> u32 {
        self.version
    }
}

impl Document for HwSetFile {
    fn version(&self) -> u32 {
        self.version
    }
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// Filesystem-backed [`InventoryStore`].
pub struct FileStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (or create) a store rooted at `base_dir`.
    ///
    /// Creates `projects/` and `hwsets/` if they do not already exist.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::StorageUnavailable` if a directory cannot be
    /// created.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        for sub in [PROJECTS_DIR, HWSETS_DIR] {
            let dir = base_dir.join(sub);
            std::fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;
        }
        Ok(Self {
            base_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of this store.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| InventoryError::StorageUnavailable("file store lock poisoned".into()))
    }

    // ── Paths ─────────────────────────────────────────────────────────────────

    fn project_path(&self, name: &str) -> PathBuf {
        let stem = bs58::encode(name.as_bytes()).into_string();
        self.base_dir.join(PROJECTS_DIR).join(format!("{stem}.json"))
    }

    fn hwset_path(&self, id: &HwSetId) -> PathBuf {
        self.base_dir
            .join(HWSETS_DIR)
            .join(format!("{}.json", id.as_str()))
    }

    // ── Typed document access ────────────────────────────────────────────────

    fn read_project(&self, name: &str) -> Result<Option<Project>> {
        let file: Option<ProjectFile> = read_document(&self.project_path(name))?;
        Ok(file.map(|f| f.project))
    }

    fn write_project(&self, project: &Project) -> Result<()> {
        let file = ProjectFile {
            version: INVENTORY_FILE_VERSION,
            project: project.clone(),
        };
        write_document(&self.project_path(&project.name), &file)
    }

    fn read_hwset(&self, id: &HwSetId) -> Result<Option<HardwareSet>> {
        let file: Option<HwSetFile> = read_document(&self.hwset_path(id))?;
        Ok(file.map(|f| f.hwset))
    }

    fn write_hwset(&self, hwset: &HardwareSet) -> Result<()> {
        let file = HwSetFile {
            version: INVENTORY_FILE_VERSION,
            hwset: hwset.clone(),
        };
        write_document(&self.hwset_path(&hwset.id), &file)
    }

    fn update_members<F>(&self, project: &str, update: F) -> Result<MembershipChange>
    where
        F: FnOnce(&mut Project) -> bool,
    {
        let _guard = self.lock()?;
        let Some(mut record) = self.read_project(project)? else {
            return Ok(MembershipChange::ProjectMissing);
        };
        if !update(&mut record) {
            return Ok(MembershipChange::Unchanged);
        }
        self.write_project(&record)?;
        Ok(MembershipChange::Applied)
    }
}

impl InventoryStore for FileStore {
    fn get_project(&self, name: &str) -> Result<Option<Project>> {
        self.read_project(name)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let dir = self.base_dir.join(PROJECTS_DIR);
        let mut projects: Vec<Project> = list_documents::<ProjectFile>(&dir)?
            .into_iter()
            .map(|f| f.project)
            .collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(projects)
    }

    fn insert_project(&self, project: Project) -> Result<()> {
        let _guard = self.lock()?;
        if self.project_path(&project.name).exists() {
            return Err(InventoryError::Conflict(format!(
                "project already exists: {}",
                project.name
            )));
        }
        debug!("file store: insert project {}", project.name);
        self.write_project(&project)
    }

    fn add_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        self.update_members(project, |p| p.authorized_users.insert(identity.to_string()))
    }

    fn remove_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        self.update_members(project, |p| p.authorized_users.remove(identity))
    }

    fn get_hwset(&self, id: &HwSetId) -> Result<Option<HardwareSet>> {
        self.read_hwset(id)
    }

    fn list_hwsets(&self) -> Result<Vec<HardwareSet>> {
        let dir = self.base_dir.join(HWSETS_DIR);
        let mut sets: Vec<HardwareSet> = list_documents::<HwSetFile>(&dir)?
            .into_iter()
            .map(|f| f.hwset)
            .collect();
        sets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(sets)
    }

    fn insert_hwset(&self, hwset: HardwareSet) -> Result<()> {
        if !hwset.is_consistent() {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set {} has available {} above capacity {}",
                hwset.id, hwset.available, hwset.capacity
            )));
        }
        let _guard = self.lock()?;
        if self.hwset_path(&hwset.id).exists() {
            return Err(InventoryError::Conflict(format!(
                "hardware set already exists: {}",
                hwset.id
            )));
        }
        debug!("file store: insert hwset {}", hwset.id);
        self.write_hwset(&hwset)
    }

    fn adjust_available(
        &self,
        id: &HwSetId,
        delta: i64,
        guard: &AllocationGuard,
    ) -> Result<AdjustOutcome> {
        let _lock = self.lock()?;
        let project = self.read_project(&guard.project)?;
        let Some(mut hwset) = self.read_hwset(id)? else {
            return Ok(plan_adjustment(project.as_ref(), None, delta, guard)
                .err()
                .unwrap_or(AdjustOutcome::HwSetMissing));
        };
        match plan_adjustment(project.as_ref(), Some(&hwset), delta, guard) {
            Ok(next) => {
                hwset.available = next;
                self.write_hwset(&hwset)?;
                Ok(AdjustOutcome::Applied {
                    available: hwset.available,
                    capacity: hwset.capacity,
                })
            }
            Err(outcome) => Ok(outcome),
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn unavailable(path: &Path, e: std::io::Error) -> InventoryError {
    InventoryError::StorageUnavailable(format!("{}: {e}", path.display()))
}

/// Read and parse a document; a missing file is `Ok(None)`.
fn read_document<T: Document>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(unavailable(path, e)),
    };
    let doc: T = serde_json::from_slice(&bytes).map_err(|e| {
        InventoryError::InvalidFileFormat(format!("failed to parse {}: {e}", path.display()))
    })?;
    if doc.version() != INVENTORY_FILE_VERSION {
        return Err(InventoryError::InvalidFileFormat(format!(
            "{}: unsupported document version {}",
            path.display(),
            doc.version()
        )));
    }
    Ok(Some(doc))
}

/// Serialize to a sibling temp file, then rename over `path`.
fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| InventoryError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes()).map_err(|e| unavailable(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| unavailable(path, e))
}

/// Parse every `*.json` document in a directory.
fn list_documents<T: Document>(dir: &Path) -> Result<Vec<T>> {
    let mut docs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| unavailable(dir, e))? {
        let path = entry.map_err(|e| unavailable(dir, e))?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(doc) = read_document(&path)? {
            docs.push(doc);
        }
    }
    Ok(docs)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

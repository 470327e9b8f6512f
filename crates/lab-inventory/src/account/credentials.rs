//! Credential records and their stores.
//!
//! ```text
//! {base_dir}/
//! └── {bs58(username)}.json   { "version": 1, "user": { ... UserRecord ... } }
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::crypto::random::random_bytes;
use crate::error::{InventoryError, Result};

const USER_FILE_VERSION: u32 = 1;

/// A registered user. `password_hash` is an Argon2id PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: u64,
}

/// Username → credential record.
pub trait CredentialStore: Send + Sync {
    fn get(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Insert a record if the username is free.
    ///
    /// Returns `InventoryError::Conflict` if the username is taken.
    fn insert(&self, record: UserRecord) -> Result<()>;
}

// ── In memory ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let users = self
            .users
            .lock()
            .map_err(|_| InventoryError::StorageUnavailable("credential lock poisoned".into()))?;
        Ok(users.get(username).cloned())
    }

    fn insert(&self, record: UserRecord) -> Result<()> {
        let mut users = self
            .users
            .lock()
            .map_err(|_| InventoryError::StorageUnavailable("credential lock poisoned".into()))?;
        if users.contains_key(&record.username) {
            return Err(InventoryError::Conflict(format!(
                "user already exists: {}",
                record.username
            )));
        }
        users.insert(record.username.clone(), record);
        Ok(())
    }
}

// ── On disk ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct UserFile {
    version: u32,
    user: UserRecord,
}

/// One JSON document per user.
pub struct FileCredentialStore {
    base_dir: PathBuf,
}

impl FileCredentialStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| {
            InventoryError::StorageUnavailable(format!("{}: {e}", base_dir.display()))
        })?;
        Ok(Self { base_dir })
    }

    fn user_path(&self, username: &str) -> PathBuf {
        let stem = bs58::encode(username.as_bytes()).into_string();
        self.base_dir.join(format!("{stem}.json"))
    }

    /// Unique per insert, so racing registrations never share a temp file.
    fn temp_path(&self, path: &Path) -> PathBuf {
        let nonce = bs58::encode(random_bytes::<8>()).into_string();
        path.with_extension(format!("json.{nonce}.tmp"))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, username: &str) -> Result<Option<UserRecord>> {
        let path = self.user_path(username);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        let file: UserFile = serde_json::from_slice(&bytes).map_err(|e| {
            InventoryError::InvalidFileFormat(format!("failed to parse {}: {e}", path.display()))
        })?;
        if file.version != USER_FILE_VERSION {
            return Err(InventoryError::InvalidFileFormat(format!(
                "{}: unsupported user file version {}",
                path.display(),
                file.version
            )));
        }
        Ok(Some(file.user))
    }

    fn insert(&self, record: UserRecord) -> Result<()> {
        let path = self.user_path(&record.username);
        let json = serde_json::to_string_pretty(&UserFile {
            version: USER_FILE_VERSION,
            user: record.clone(),
        })
        .map_err(|e| InventoryError::Serialization(e.to_string()))?;

        // The record is complete on disk before it becomes visible; hard_link
        // refuses to replace an existing name.
        let tmp = self.temp_path(&path);
        std::fs::write(&tmp, json.as_bytes()).map_err(|e| unavailable(&tmp, e))?;
        let linked = std::fs::hard_link(&tmp, &path);
        let _ = std::fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(InventoryError::Conflict(
                format!("user already exists: {}", record.username),
            )),
            Err(e) => Err(unavailable(&path, e)),
        }
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> InventoryError {
    InventoryError::StorageUnavailable(format!("{}: {e}", path.display()))
}

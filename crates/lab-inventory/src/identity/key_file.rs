//! Issuer key persistence.
//!
//! The token signing key is stored as a small JSON document:
//!
//! ```json
//! {
//!   "version": 1,
//!   "created_at": 1700000000000000,
//!   "public_key": "<base64>",
//!   "signing_key": "<base64>"
//! }
//! ```
//!
//! On Unix the file is created with mode `0600`.

use std::io::ErrorKind;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::info;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::keys::Ed25519KeyPair;
use crate::error::{InventoryError, Result};

const KEY_FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct IssuerKeyFile {
    version: u32,
    created_at: u64,
    public_key: String,
    signing_key: String,
}

/// Write the issuer key pair to `path`, replacing any existing file.
pub fn save_issuer_key(key_pair: &Ed25519KeyPair, path: &Path) -> Result<()> {
    let mut signing_bytes = key_pair.signing_key_bytes();
    let signing_key = STANDARD.encode(signing_bytes);
    signing_bytes.zeroize();

    let mut file = IssuerKeyFile {
        version: KEY_FILE_VERSION,
        created_at: crate::time::now_micros(),
        public_key: STANDARD.encode(key_pair.verifying_key_bytes()),
        signing_key,
    };
    let json = serde_json::to_string_pretty(&file)
        .map_err(|e| InventoryError::Serialization(e.to_string()));
    file.signing_key.zeroize();
    let mut json = json?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("key.tmp");
    let written = write_private(&tmp, json.as_bytes());
    json.zeroize();
    written?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read the issuer key pair from `path`.
///
/// # Errors
///
/// Returns `InventoryError::InvalidFileFormat` if the file does not hold a
/// consistent key pair, or `InventoryError::Io` if it cannot be read.
pub fn load_issuer_key(path: &Path) -> Result<Ed25519KeyPair> {
    let bytes = std::fs::read(path)?;
    let mut file: IssuerKeyFile = serde_json::from_slice(&bytes).map_err(|e| {
        InventoryError::InvalidFileFormat(format!("failed to parse key file {}: {e}", path.display()))
    })?;
    if file.version != KEY_FILE_VERSION {
        return Err(InventoryError::InvalidFileFormat(format!(
            "unsupported key file version {}",
            file.version
        )));
    }

    let decoded = STANDARD.decode(&file.signing_key);
    file.signing_key.zeroize();
    let mut raw = decoded
        .map_err(|e| InventoryError::InvalidFileFormat(format!("invalid signing key base64: {e}")))?;
    let key_bytes: std::result::Result<[u8; 32], _> = raw.as_slice().try_into();
    raw.zeroize();
    let mut key_bytes = key_bytes
        .map_err(|_| InventoryError::InvalidFileFormat("signing key must be 32 bytes".into()))?;

    let key_pair = Ed25519KeyPair::from_signing_key_bytes(&key_bytes);
    key_bytes.zeroize();

    if STANDARD.encode(key_pair.verifying_key_bytes()) != file.public_key {
        return Err(InventoryError::InvalidFileFormat(
            "public key does not match signing key".into(),
        ));
    }
    Ok(key_pair)
}

/// Load the issuer key at `path`, generating and saving one if absent.
pub fn load_or_create_issuer_key(path: &Path) -> Result<Ed25519KeyPair> {
    match load_issuer_key(path) {
        Ok(key_pair) => Ok(key_pair),
        Err(InventoryError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            let key_pair = Ed25519KeyPair::generate();
            save_issuer_key(&key_pair, path)?;
            info!("generated new token issuer key at {}", path.display());
            Ok(key_pair)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    Ok(())
}

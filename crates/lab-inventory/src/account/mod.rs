//! Account registration and login.
//!
//! Passwords are hashed with Argon2id and never leave this module in any
//! form other than the PHC hash. A successful login yields a signed identity
//! token from the shared [`TokenIssuer`].

pub mod credentials;

use std::sync::Arc;

use log::{debug, info};

use crate::crypto::password;
use crate::error::{InventoryError, Result};
use crate::identity::{Caller, TokenIssuer};

pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore, UserRecord};

/// Longest accepted username.
const MAX_USERNAME_LEN: usize = 64;

/// Registration, login, and token verification.
pub struct AccountService<C> {
    credentials: C,
    issuer: Arc<TokenIssuer>,
}

impl<C: CredentialStore> AccountService<C> {
    pub fn new(credentials: C, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            credentials,
            issuer,
        }
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank or over-long username or an empty password,
    /// `Conflict` if the username is taken.
    pub fn register(&self, username: &str, password: &str) -> Result<()> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(InventoryError::InvalidInput("password is required".into()));
        }
        // Cheap pre-check so duplicate registrations skip the hash.
        if self.credentials.get(username)?.is_some() {
            return Err(InventoryError::Conflict(format!(
                "user already exists: {username}"
            )));
        }
        let record = UserRecord {
            username: username.to_string(),
            password_hash: password::hash_password(password)?,
            created_at: crate::time::now_micros(),
        };
        self.credentials.insert(record)?;
        info!("registered user {username}");
        Ok(())
    }

    /// Check credentials and issue a token.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for missing fields, `NotFound` for an unknown user,
    /// `Unauthenticated` for a wrong password.
    pub fn login(&self, username: &str, password: &str) -> Result<String> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(InventoryError::InvalidInput("password is required".into()));
        }
        let record = self
            .credentials
            .get(username)?
            .ok_or_else(|| InventoryError::NotFound(format!("user not found: {username}")))?;
        if !password::verify_password(password, &record.password_hash)? {
            debug!("login rejected for {username}");
            return Err(InventoryError::Unauthenticated(
                "invalid username or password".into(),
            ));
        }
        info!("user {username} logged in");
        self.issuer.issue(username)
    }

    /// Verify a bearer token.
    pub fn authenticate(&self, token: &str) -> Result<Caller> {
        self.issuer.verify(token)
    }
}

fn validate_username(raw: &str) -> Result<&str> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(InventoryError::InvalidInput("username is required".into()));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(InventoryError::InvalidInput(format!(
            "username longer than {MAX_USERNAME_LEN} bytes"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(InventoryError::InvalidInput(
            "username contains control characters".into(),
        ));
    }
    Ok(username)
}

//! Signed identity tokens.
//!
//! A token is `base64url(claims_json) "." base64url(signature)`, with the
//! Ed25519 signature taken over the exact encoded claims segment. Claims
//! carry the subject and a validity window in microseconds since epoch.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::Ed25519KeyPair;
use crate::crypto::signing;
use crate::error::{InventoryError, Result};

use super::Caller;

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Payload of an identity token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identity the token asserts.
    pub sub: String,
    /// Issued at (microseconds since epoch).
    pub iat: u64,
    /// Expires at (microseconds since epoch).
    pub exp: u64,
}

/// Issues and verifies identity tokens with one Ed25519 key.
pub struct TokenIssuer {
    key_pair: Ed25519KeyPair,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(key_pair: Ed25519KeyPair, ttl: Duration) -> Self {
        Self { key_pair, ttl }
    }

    /// An issuer with a fresh random key, for tests and throwaway servers.
    pub fn generate(ttl: Duration) -> Self {
        Self::new(Ed25519KeyPair::generate(), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Public fingerprint of the signing key.
    pub fn fingerprint(&self) -> String {
        self.key_pair.fingerprint()
    }

    /// Issue a token for `identity`, valid from now for the configured TTL.
    pub fn issue(&self, identity: &str) -> Result<String> {
        self.issue_at(identity, crate::time::now_micros())
    }

    /// Issue a token as if the current time were `now` (microseconds).
    pub fn issue_at(&self, identity: &str, now: u64) -> Result<String> {
        if identity.is_empty() {
            return Err(InventoryError::InvalidInput(
                "token subject must not be empty".into(),
            ));
        }
        let claims = TokenClaims {
            sub: identity.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl.as_micros() as u64),
        };
        let json = serde_json::to_vec(&claims)
            .map_err(|e| InventoryError::Serialization(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = signing::sign_to_base64(self.key_pair.signing_key(), payload.as_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Verify a token and return the caller it asserts.
    pub fn verify(&self, token: &str) -> Result<Caller> {
        self.verify_at(token, crate::time::now_micros())
    }

    /// Verify a token as if the current time were `now` (microseconds).
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Caller> {
        let claims = self.verified_claims(token)?;
        if now >= claims.exp {
            return Err(InventoryError::Unauthenticated("token expired".into()));
        }
        if now < claims.iat {
            return Err(InventoryError::Unauthenticated("token not yet valid".into()));
        }
        Ok(Caller::verified(claims.sub))
    }

    /// Check the signature and decode the claims, ignoring the time window.
    pub fn verified_claims(&self, token: &str) -> Result<TokenClaims> {
        let (payload, signature) = token
            .trim()
            .split_once('.')
            .ok_or_else(|| InventoryError::Unauthenticated("malformed token".into()))?;
        signing::verify_from_base64(self.key_pair.verifying_key(), payload.as_bytes(), signature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| InventoryError::Unauthenticated("malformed token payload".into()))?;
        let claims: TokenClaims = serde_json::from_slice(&json)
            .map_err(|_| InventoryError::Unauthenticated("malformed token claims".into()))?;
        if claims.sub.is_empty() {
            return Err(InventoryError::Unauthenticated("token has no subject".into()));
        }
        Ok(claims)
    }
}

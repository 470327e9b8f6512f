//! Cryptographic primitives behind accounts and identity tokens.
//!
//! This module provides:
//! - Ed25519 key generation, signing, and verification (token signatures)
//! - Argon2id password hashing in PHC string format
//! - Cryptographically secure random number generation

pub mod keys;
pub mod password;
pub mod random;
pub mod signing;

//! Ed25519 signing and verification over URL-safe base64.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::{InventoryError, Result};

/// Sign a message with an Ed25519 signing key.
pub fn sign(signing_key: &SigningKey, message: &[u8]) -> Signature {
    signing_key.sign(message)
}

/// Verify an Ed25519 signature against a public key and message.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    verifying_key
        .verify(message, signature)
        .map_err(|_| InventoryError::Unauthenticated("signature verification failed".into()))
}

/// Sign a message and return the signature as unpadded URL-safe base64.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(sign(signing_key, message).to_bytes())
}

/// Verify an unpadded URL-safe base64 signature.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> Result<()> {
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|e| InventoryError::Unauthenticated(format!("invalid signature encoding: {e}")))?;

    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| InventoryError::Unauthenticated("signature must be 64 bytes".into()))?;

    verify(verifying_key, message, &Signature::from_bytes(&sig_array))
}

//! Caller identity.
//!
//! Every engine call takes a [`Caller`]: the verified identity string of
//! whoever is acting. Callers come from verifying a signed token
//! ([`TokenIssuer::verify`]) or, for local administration, from
//! [`Caller::trusted`].

pub mod key_file;
pub mod token;

pub use key_file::{load_issuer_key, load_or_create_issuer_key, save_issuer_key};
pub use token::{TokenClaims, TokenIssuer};

/// A verified caller identity, threaded explicitly through engine calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    identity: String,
}

impl Caller {
    /// A caller vouched for by the host process rather than by a token.
    pub fn trusted(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    pub(crate) fn verified(identity: String) -> Self {
        Self { identity }
    }

    /// The identity string used for membership checks.
    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl std::fmt::Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.identity)
    }
}

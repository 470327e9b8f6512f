//! Error types for the lab inventory.
//!
//! Every failure a caller can observe is one variant of [`InventoryError`].
//! Domain failures are terminal for the request; only storage failures are
//! worth retrying. Passwords and key material never appear in messages.

/// Inventory error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Identity {identity} is not authorized for project {project}")]
    Forbidden { project: String, identity: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(
        "Checking in {requested} to {hwset} exceeds capacity: available {available}, capacity {capacity}"
    )]
    CapacityExceeded {
        hwset: String,
        requested: u64,
        available: u64,
        capacity: u64,
    },

    #[error("Cannot check out {requested} from {hwset}: only {available} available")]
    InsufficientAvailable {
        hwset: String,
        requested: u64,
        available: u64,
    },

    #[error("Hardware set {hwset} is not assigned to project {project}")]
    NotAssigned { project: String, hwset: String },

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl InventoryError {
    /// HTTP status code this error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_)
            | Self::CapacityExceeded { .. }
            | Self::InsufficientAvailable { .. } => 400,
            Self::Unauthenticated(_) => 401,
            Self::Forbidden { .. } => 403,
            Self::NotFound(_) | Self::NotAssigned { .. } => 404,
            Self::Conflict(_) => 409,
            Self::StorageUnavailable(_) | Self::Io(_) => 503,
            Self::InvalidFileFormat(_) | Self::Serialization(_) | Self::Crypto(_) => 500,
        }
    }

    /// Stable machine-readable kind, used as the `error` field of API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Forbidden { .. } => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::InsufficientAvailable { .. } => "insufficient_available",
            Self::NotAssigned { .. } => "not_assigned",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::StorageUnavailable(_) | Self::Io(_) => "storage_unavailable",
            Self::InvalidFileFormat(_) | Self::Serialization(_) | Self::Crypto(_) => "internal",
        }
    }

    /// Whether the caller may safely retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_) | Self::Io(_))
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, InventoryError>;

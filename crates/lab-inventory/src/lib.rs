//! Lab Inventory — shared hardware pools, project membership, and
//! capacity-checked checkin/checkout.
//!
//! Hardware quantities live on global [`HardwareSet`] records. Projects carry
//! the identities allowed to act for them and the hardware sets they may draw
//! from. Every quantity change is one conditional update in an
//! [`InventoryStore`], so `0 <= available <= capacity` holds under any
//! interleaving of callers.
//!
//! ```no_run
//! use lab_inventory::{AllocationEngine, Caller, HwSetId, MemoryStore};
//!
//! let engine = AllocationEngine::new(MemoryStore::new());
//! let alice = Caller::trusted("alice");
//! let h1 = HwSetId::parse("HWSet1")?;
//! engine.checkout("Project 1", &h1, 5, &alice)?;
//! # Ok::<(), lab_inventory::InventoryError>(())
//! ```

pub mod account;
pub mod api;
pub mod authz;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod identity;
pub mod model;
pub mod seed;
pub mod store;
pub mod time;

// Re-export primary types
pub use error::{InventoryError, Result};
pub use model::{HardwareSet, HwSetId, Project, ProjectView};
pub use engine::{Allocation, AllocationEngine};
pub use identity::{Caller, TokenIssuer};
pub use store::{
    AdjustOutcome, AllocationGuard, FileStore, InventoryStore, MembershipChange, MemoryStore,
};

// Re-export boundary types
pub use account::{AccountService, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use api::{Api, ApiRequest, ApiResponse, Method};
pub use config::Config;
pub use seed::{ImportReport, SeedDocument};

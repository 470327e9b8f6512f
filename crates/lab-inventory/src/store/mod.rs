//! Inventory persistence.
//!
//! [`InventoryStore`] is the only place quantities change. Every mutation is
//! a single atomic operation on the store: callers never read a record,
//! modify it, and write it back.
//!
//! # Modules
//!
//! - [`memory`] — [`MemoryStore`], everything behind one mutex.
//! - [`file`] — [`FileStore`], one JSON document per record.

pub mod file;
pub mod memory;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{HardwareSet, HwSetId, Project, QuantityViolation};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Effect of a membership update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// The set changed.
    Applied,
    /// The set already had the requested shape.
    Unchanged,
    /// No project with that name.
    ProjectMissing,
}

/// Conditions re-checked inside the same atomic update as a quantity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationGuard {
    /// Project the units are moved for.
    pub project: String,
    /// Identity that must be a member of `project`.
    pub identity: String,
}

impl AllocationGuard {
    pub fn new(project: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            identity: identity.into(),
        }
    }
}

/// Result of [`InventoryStore::adjust_available`].
///
/// Only `Applied` changes state; every other variant leaves the store as it
/// was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustOutcome {
    Applied { available: u64, capacity: u64 },
    WouldExceedCapacity { available: u64, capacity: u64 },
    WouldGoNegative { available: u64 },
    HwSetMissing,
    ProjectMissing,
    NotMember,
    NotAssigned,
}

/// Persistent records for projects and hardware sets.
pub trait InventoryStore: Send + Sync {
    fn get_project(&self, name: &str) -> Result<Option<Project>>;

    /// All projects, ordered by name.
    fn list_projects(&self) -> Result<Vec<Project>>;

    /// Insert a project if no project with the same name exists.
    ///
    /// Returns `InventoryError::Conflict` on a duplicate name.
    fn insert_project(&self, project: Project) -> Result<()>;

    /// Add `identity` to the project's authorized users.
    fn add_member(&self, project: &str, identity: &str) -> Result<MembershipChange>;

    /// Remove `identity` from the project's authorized users.
    fn remove_member(&self, project: &str, identity: &str) -> Result<MembershipChange>;

    fn get_hwset(&self, id: &HwSetId) -> Result<Option<HardwareSet>>;

    /// All hardware sets, ordered by id.
    fn list_hwsets(&self) -> Result<Vec<HardwareSet>>;

    /// Insert a hardware set if the id is unused.
    ///
    /// Returns `InventoryError::Conflict` on a duplicate id and
    /// `InventoryError::InvalidInput` if `available > capacity`.
    fn insert_hwset(&self, hwset: HardwareSet) -> Result<()>;

    /// Add `delta` to the hardware set's `available` count, atomically, if
    /// the guard still holds and the result stays within `0..=capacity`.
    fn adjust_available(
        &self,
        id: &HwSetId,
        delta: i64,
        guard: &AllocationGuard,
    ) -> Result<AdjustOutcome>;
}

impl<S: InventoryStore + ?Sized> InventoryStore for Arc<S> {
    fn get_project(&self, name: &str) -> Result<Option<Project>> {
        (**self).get_project(name)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        (**self).list_projects()
    }

    fn insert_project(&self, project: Project) -> Result<()> {
        (**self).insert_project(project)
    }

    fn add_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        (**self).add_member(project, identity)
    }

    fn remove_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        (**self).remove_member(project, identity)
    }

    fn get_hwset(&self, id: &HwSetId) -> Result<Option<HardwareSet>> {
        (**self).get_hwset(id)
    }

    fn list_hwsets(&self) -> Result<Vec<HardwareSet>> {
        (**self).list_hwsets()
    }

    fn insert_hwset(&self, hwset: HardwareSet) -> Result<()> {
        (**self).insert_hwset(hwset)
    }

    fn adjust_available(
        &self,
        id: &HwSetId,
        delta: i64,
        guard: &AllocationGuard,
    ) -> Result<AdjustOutcome> {
        (**self).adjust_available(id, delta, guard)
    }
}

/// Decide a quantity change from snapshots taken inside the caller's
/// critical section.
///
/// `Ok(next)` is the availability to write back; `Err` is the outcome to
/// report without writing.
pub(crate) fn plan_adjustment(
    project: Option<&Project>,
    hwset: Option<&HardwareSet>,
    delta: i64,
    guard: &AllocationGuard,
) -> std::result::Result<u64, AdjustOutcome> {
    let project = project.ok_or(AdjustOutcome::ProjectMissing)?;
    if !project.is_member(&guard.identity) {
        return Err(AdjustOutcome::NotMember);
    }
    let hwset = hwset.ok_or(AdjustOutcome::HwSetMissing)?;
    if !project.is_assigned(&hwset.id) {
        return Err(AdjustOutcome::NotAssigned);
    }
    hwset.adjusted(delta).map_err(|violation| match violation {
        QuantityViolation::ExceedsCapacity => AdjustOutcome::WouldExceedCapacity {
            available: hwset.available,
            capacity: hwset.capacity,
        },
        QuantityViolation::BelowZero => AdjustOutcome::WouldGoNegative {
            available: hwset.available,
        },
    })
}

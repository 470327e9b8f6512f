//! Allocation engine — the consistency-preserving operations over projects
//! and hardware sets.
//!
//! The engine keeps no state of its own. Eligibility (membership, assignment)
//! is probed first so failures carry precise errors; the quantity change
//! itself is one conditional update in the store, which re-checks the same
//! eligibility before applying it.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::authz::authorize;
use crate::error::{InventoryError, Result};
use crate::identity::Caller;
use crate::model::project::validate_project_name;
use crate::model::{HardwareSet, HwSetId, Project, ProjectView};
use crate::store::{AdjustOutcome, AllocationGuard, InventoryStore, MembershipChange};

/// Availability of a hardware set after a successful checkin or checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub hwset: HwSetId,
    pub available: u64,
    pub capacity: u64,
}

/// Direction of a quantity move, seen from the global pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    /// Units return to the pool.
    Checkin,
    /// Units leave the pool.
    Checkout,
}

impl Direction {
    fn verb(self) -> &'static str {
        match self {
            Self::Checkin => "checked in",
            Self::Checkout => "checked out",
        }
    }
}

/// Executes inventory operations against an injected store.
pub struct AllocationEngine<S> {
    store: S,
}

impl<S: InventoryStore> AllocationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ── Membership ───────────────────────────────────────────────────────────

    /// Add the caller to the project's authorized users.
    ///
    /// Never fails for domain reasons: an existing member or a missing
    /// project is reported through the returned [`MembershipChange`].
    pub fn join(&self, project: &str, caller: &Caller) -> Result<MembershipChange> {
        let change = self.store.add_member(project, caller.identity())?;
        match change {
            MembershipChange::Applied => info!("{caller} joined project {project}"),
            MembershipChange::Unchanged => debug!("{caller} already in project {project}"),
            MembershipChange::ProjectMissing => debug!("join: no project {project}"),
        }
        Ok(change)
    }

    /// Remove the caller from the project's authorized users.
    ///
    /// Like [`join`](Self::join), a no-op is not an error.
    pub fn leave(&self, project: &str, caller: &Caller) -> Result<MembershipChange> {
        let change = self.store.remove_member(project, caller.identity())?;
        match change {
            MembershipChange::Applied => info!("{caller} left project {project}"),
            MembershipChange::Unchanged => debug!("{caller} was not in project {project}"),
            MembershipChange::ProjectMissing => debug!("leave: no project {project}"),
        }
        Ok(change)
    }

    // ── Creation ─────────────────────────────────────────────────────────────

    /// Create a project whose only member is the caller.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank name or a hardware set reference that is
    /// malformed or unknown, `Conflict` if the name is taken.
    pub fn create_project<I, T>(
        &self,
        name: &str,
        hwset_refs: I,
        description: &str,
        caller: &Caller,
    ) -> Result<Project>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let name = name.trim();
        validate_project_name(name)?;

        let mut hwsets = Vec::new();
        for raw in hwset_refs {
            let id = HwSetId::parse(raw.as_ref())?;
            if self.store.get_hwset(&id)?.is_none() {
                return Err(InventoryError::InvalidInput(format!(
                    "unknown hardware set: {id}"
                )));
            }
            hwsets.push(id);
        }

        let project = Project::new(name, description, hwsets, caller.identity());
        self.store.insert_project(project.clone())?;
        info!(
            "{caller} created project {name} with {} hardware set(s)",
            project.hardware_sets.len()
        );
        Ok(project)
    }

    // ── Quantity moves ───────────────────────────────────────────────────────

    /// Return `qty` units of `hwset` to the pool on behalf of `project`.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero quantity, `NotFound`/`Forbidden` from the
    /// authorization gate, `NotAssigned` if the project may not use the
    /// hardware set, `CapacityExceeded` if the pool would overflow.
    pub fn checkin(
        &self,
        project: &str,
        hwset: &HwSetId,
        qty: u64,
        caller: &Caller,
    ) -> Result<Allocation> {
        self.apply(project, hwset, qty, caller, Direction::Checkin)
    }

    /// Take `qty` units of `hwset` from the pool on behalf of `project`.
    ///
    /// # Errors
    ///
    /// As [`checkin`](Self::checkin), with `InsufficientAvailable` in place of
    /// `CapacityExceeded`.
    pub fn checkout(
        &self,
        project: &str,
        hwset: &HwSetId,
        qty: u64,
        caller: &Caller,
    ) -> Result<Allocation> {
        self.apply(project, hwset, qty, caller, Direction::Checkout)
    }

    fn apply(
        &self,
        project: &str,
        hwset: &HwSetId,
        qty: u64,
        caller: &Caller,
        direction: Direction,
    ) -> Result<Allocation> {
        let magnitude = i64::try_from(qty)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                InventoryError::InvalidInput(format!("quantity must be a positive integer, got {qty}"))
            })?;

        let record = authorize(&self.store, project, caller)?;
        if !record.is_assigned(hwset) {
            return Err(not_assigned(project, hwset));
        }

        let delta = match direction {
            Direction::Checkin => magnitude,
            Direction::Checkout => -magnitude,
        };
        let guard = AllocationGuard::new(project, caller.identity());
        let outcome = self.store.adjust_available(hwset, delta, &guard)?;

        match outcome {
            AdjustOutcome::Applied {
                available,
                capacity,
            } => {
                info!(
                    "{caller} {} {qty} x {hwset} for project {project}: {available}/{capacity} available",
                    direction.verb()
                );
                Ok(Allocation {
                    hwset: hwset.clone(),
                    available,
                    capacity,
                })
            }
            AdjustOutcome::WouldExceedCapacity {
                available,
                capacity,
            } => {
                debug!("checkin of {qty} x {hwset} refused: {available}/{capacity}");
                Err(InventoryError::CapacityExceeded {
                    hwset: hwset.to_string(),
                    requested: qty,
                    available,
                    capacity,
                })
            }
            AdjustOutcome::WouldGoNegative { available } => {
                debug!("checkout of {qty} x {hwset} refused: {available} available");
                Err(InventoryError::InsufficientAvailable {
                    hwset: hwset.to_string(),
                    requested: qty,
                    available,
                })
            }
            AdjustOutcome::HwSetMissing => {
                warn!("project {project} references missing hardware set {hwset}");
                Err(InventoryError::NotFound(format!(
                    "hardware set not found: {hwset}"
                )))
            }
            AdjustOutcome::ProjectMissing => Err(InventoryError::NotFound(format!(
                "project not found: {project}"
            ))),
            AdjustOutcome::NotMember => Err(InventoryError::Forbidden {
                project: project.to_string(),
                identity: caller.identity().to_string(),
            }),
            AdjustOutcome::NotAssigned => Err(not_assigned(project, hwset)),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// All projects with their hardware sets resolved.
    pub fn list_projects(&self) -> Result<Vec<ProjectView>> {
        let hwsets: BTreeMap<HwSetId, HardwareSet> = self
            .store
            .list_hwsets()?
            .into_iter()
            .map(|h| (h.id.clone(), h))
            .collect();
        Ok(self
            .store
            .list_projects()?
            .into_iter()
            .map(|p| ProjectView::resolve(p, |id| hwsets.get(id).cloned()))
            .collect())
    }

    /// All hardware sets, ordered by id.
    pub fn list_hardware_sets(&self) -> Result<Vec<HardwareSet>> {
        self.store.list_hwsets()
    }

    /// One project with its hardware sets resolved.
    pub fn get_project(&self, name: &str) -> Result<ProjectView> {
        let project = self
            .store
            .get_project(name)?
            .ok_or_else(|| InventoryError::NotFound(format!("project not found: {name}")))?;
        let mut lookup_error = None;
        let view = ProjectView::resolve(project, |id| match self.store.get_hwset(id) {
            Ok(found) => found,
            Err(e) => {
                lookup_error.get_or_insert(e);
                None
            }
        });
        match lookup_error {
            Some(e) => Err(e),
            None => Ok(view),
        }
    }
}

fn not_assigned(project: &str, hwset: &HwSetId) -> InventoryError {
    InventoryError::NotAssigned {
        project: project.to_string(),
        hwset: hwset.to_string(),
    }
}

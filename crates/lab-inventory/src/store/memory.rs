//! In-process inventory store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use log::debug;

use crate::error::{InventoryError, Result};
use crate::model::{HardwareSet, HwSetId, Project};

use super::{plan_adjustment, AdjustOutcome, AllocationGuard, InventoryStore, MembershipChange};

#[derive(Debug, Default)]
struct Inventory {
    projects: BTreeMap<String, Project>,
    hwsets: BTreeMap<HwSetId, HardwareSet>,
}

/// Inventory held in memory behind a single mutex.
///
/// One lock covers both collections, so the guard check and the quantity
/// update in [`InventoryStore::adjust_available`] see the same snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inventory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inventory>> {
        self.inner
            .lock()
            .map_err(|_| InventoryError::StorageUnavailable("memory store lock poisoned".into()))
    }
}

impl InventoryStore for MemoryStore {
    fn get_project(&self, name: &str) -> Result<Option<Project>> {
        Ok(self.lock()?.projects.get(name).cloned())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.lock()?.projects.values().cloned().collect())
    }

    fn insert_project(&self, project: Project) -> Result<()> {
        let mut inv = self.lock()?;
        if inv.projects.contains_key(&project.name) {
            return Err(InventoryError::Conflict(format!(
                "project already exists: {}",
                project.name
            )));
        }
        debug!("memory store: insert project {}", project.name);
        inv.projects.insert(project.name.clone(), project);
        Ok(())
    }

    fn add_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        let mut inv = self.lock()?;
        let Some(record) = inv.projects.get_mut(project) else {
            return Ok(MembershipChange::ProjectMissing);
        };
        if record.authorized_users.insert(identity.to_string()) {
            Ok(MembershipChange::Applied)
        } else {
            Ok(MembershipChange::Unchanged)
        }
    }

    fn remove_member(&self, project: &str, identity: &str) -> Result<MembershipChange> {
        let mut inv = self.lock()?;
        let Some(record) = inv.projects.get_mut(project) else {
            return Ok(MembershipChange::ProjectMissing);
        };
        if record.authorized_users.remove(identity) {
            Ok(MembershipChange::Applied)
        } else {
            Ok(MembershipChange::Unchanged)
        }
    }

    fn get_hwset(&self, id: &HwSetId) -> Result<Option<HardwareSet>> {
        Ok(self.lock()?.hwsets.get(id).cloned())
    }

    fn list_hwsets(&self) -> Result<Vec<HardwareSet>> {
        Ok(self.lock()?.hwsets.values().cloned().collect())
    }

    fn insert_hwset(&self, hwset: HardwareSet) -> Result<()> {
        if !hwset.is_consistent() {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set {} has available {} above capacity {}",
                hwset.id, hwset.available, hwset.capacity
            )));
        }
        let mut inv = self.lock()?;
        if inv.hwsets.contains_key(&hwset.id) {
            return Err(InventoryError::Conflict(format!(
                "hardware set already exists: {}",
                hwset.id
            )));
        }
        debug!("memory store: insert hwset {}", hwset.id);
        inv.hwsets.insert(hwset.id.clone(), hwset);
        Ok(())
    }

    fn adjust_available(
        &self,
        id: &HwSetId,
        delta: i64,
        guard: &AllocationGuard,
    ) -> Result<AdjustOutcome> {
        let mut inv = self.lock()?;
        let next = match plan_adjustment(
            inv.projects.get(&guard.project),
            inv.hwsets.get(id),
            delta,
            guard,
        ) {
            Ok(next) => next,
            Err(outcome) => return Ok(outcome),
        };
        let Some(hwset) = inv.hwsets.get_mut(id) else {
            return Ok(AdjustOutcome::HwSetMissing);
        };
        hwset.available = next;
        Ok(AdjustOutcome::Applied {
            available: hwset.available,
            capacity: hwset.capacity,
        })
    }
}

//! Seed and import: the administrative path that creates hardware sets and
//! bulk-loads projects.
//!
//! Two input shapes are accepted:
//!
//! ```json
//! { "hardware_sets": [ { "id": "HWSet1", "name": "Oscilloscopes", "capacity": 100, "available": 100 } ],
//!   "projects":      [ { "name": "Project 1", "authorized_users": ["alice"], "hardware_sets": ["HWSet1"] } ] }
//! ```
//!
//! and the legacy per-project layout, where every project carries its own
//! `{capacity, available}` per hardware set name. Legacy quantities are folded
//! into one global record per name; nothing per-project survives.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};
use crate::model::project::validate_project_name;
use crate::model::{HardwareSet, HwSetId, Project};
use crate::store::InventoryStore;

/// Hardware sets and projects to load into an empty or partially filled store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub hardware_sets: Vec<HardwareSet>,
    #[serde(default)]
    pub projects: Vec<ProjectSeed>,
}

impl SeedDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| InventoryError::InvalidInput(format!("invalid seed document: {e}")))
    }
}

/// A project as written in a seed document. Unlike `create_project`, the
/// membership list is taken as given and may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authorized_users: BTreeSet<String>,
    #[serde(default)]
    pub hardware_sets: BTreeSet<HwSetId>,
}

/// A project in the legacy layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authorized_users: Vec<String>,
    #[serde(default)]
    pub hardware_sets: BTreeMap<String, LegacyQuantity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyQuantity {
    pub capacity: u64,
    pub available: u64,
}

/// Parse a legacy document: a JSON array of [`LegacyProject`].
pub fn parse_legacy_projects(json: &str) -> Result<Vec<LegacyProject>> {
    serde_json::from_str(json)
        .map_err(|e| InventoryError::InvalidInput(format!("invalid legacy document: {e}")))
}

/// A legacy quantity that disagreed with the first occurrence of its
/// hardware set and was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub project: String,
    pub hwset: HwSetId,
    /// Quantity kept (first occurrence).
    pub kept: LegacyQuantity,
    /// Quantity ignored.
    pub ignored: LegacyQuantity,
}

/// What an import did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub hwsets_created: usize,
    pub hwsets_skipped: usize,
    pub projects_created: usize,
    pub projects_skipped: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discrepancies: Vec<Discrepancy>,
}

/// Insert the document's hardware sets, then its projects.
///
/// The whole document is validated before anything is written. Records that
/// already exist are counted as skipped and left untouched.
///
/// # Errors
///
/// `InvalidInput` for an inconsistent hardware set, a bad project name, or a
/// project referencing a hardware set that is neither in the document nor in
/// the store.
pub fn import_seed<S: InventoryStore + ?Sized>(
    store: &S,
    doc: &SeedDocument,
) -> Result<ImportReport> {
    let mut known = BTreeSet::new();
    for hwset in &doc.hardware_sets {
        if !hwset.is_consistent() {
            return Err(InventoryError::InvalidInput(format!(
                "hardware set {}: available {} exceeds capacity {}",
                hwset.id, hwset.available, hwset.capacity
            )));
        }
        known.insert(hwset.id.clone());
    }
    for project in &doc.projects {
        validate_project_name(&project.name)?;
        for id in &project.hardware_sets {
            if !known.contains(id) && store.get_hwset(id)?.is_none() {
                return Err(InventoryError::InvalidInput(format!(
                    "project {} references unknown hardware set {id}",
                    project.name
                )));
            }
        }
    }

    let mut report = ImportReport::default();
    for hwset in &doc.hardware_sets {
        match store.insert_hwset(hwset.clone()) {
            Ok(()) => report.hwsets_created += 1,
            Err(InventoryError::Conflict(_)) => report.hwsets_skipped += 1,
            Err(e) => return Err(e),
        }
    }
    for seed in &doc.projects {
        let project = Project {
            name: seed.name.clone(),
            description: seed.description.clone(),
            authorized_users: seed.authorized_users.clone(),
            hardware_sets: seed.hardware_sets.clone(),
            created_at: crate::time::now_micros(),
        };
        match store.insert_project(project) {
            Ok(()) => report.projects_created += 1,
            Err(InventoryError::Conflict(_)) => report.projects_skipped += 1,
            Err(e) => return Err(e),
        }
    }

    info!(
        "seed import: {} hwset(s) created, {} skipped; {} project(s) created, {} skipped",
        report.hwsets_created, report.hwsets_skipped, report.projects_created, report.projects_skipped
    );
    Ok(report)
}

/// Import legacy per-project documents.
///
/// Each hardware set name becomes one global [`HardwareSet`] whose quantities
/// come from its first occurrence; later occurrences that disagree are listed
/// in [`ImportReport::discrepancies`]. Every project gets the names it listed
/// as assignments.
pub fn import_legacy_projects<S: InventoryStore + ?Sized>(
    store: &S,
    legacy: &[LegacyProject],
) -> Result<ImportReport> {
    let mut first_seen: BTreeMap<HwSetId, LegacyQuantity> = BTreeMap::new();
    let mut discrepancies = Vec::new();
    let mut doc = SeedDocument::default();

    for project in legacy {
        let mut assigned = BTreeSet::new();
        for (raw, quantity) in &project.hardware_sets {
            let id = HwSetId::parse(raw)?;
            match first_seen.get(&id) {
                None => {
                    let hwset = HardwareSet::new(id.clone(), raw.clone(), quantity.capacity)
                        .with_available(quantity.available);
                    doc.hardware_sets.push(hwset);
                    first_seen.insert(id.clone(), *quantity);
                }
                Some(kept) if kept != quantity => {
                    warn!(
                        "legacy project {}: {id} quantities {}/{} differ from first occurrence {}/{}",
                        project.name,
                        quantity.available,
                        quantity.capacity,
                        kept.available,
                        kept.capacity
                    );
                    discrepancies.push(Discrepancy {
                        project: project.name.clone(),
                        hwset: id.clone(),
                        kept: *kept,
                        ignored: *quantity,
                    });
                }
                Some(_) => {}
            }
            assigned.insert(id);
        }
        doc.projects.push(ProjectSeed {
            name: project.name.clone(),
            description: project.description.clone(),
            authorized_users: project.authorized_users.iter().cloned().collect(),
            hardware_sets: assigned,
        });
    }

    let mut report = import_seed(store, &doc)?;
    report.discrepancies = discrepancies;
    Ok(report)
}

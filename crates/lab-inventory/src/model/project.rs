//! Projects — named workspaces with a membership list and assigned hardware.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{InventoryError, Result};

use super::hwset::{HardwareSet, HwSetId};

/// Longest accepted project name.
const MAX_PROJECT_NAME_LEN: usize = 128;

/// Taken by the `/projects/hwsets` listing route.
const RESERVED_PROJECT_NAMES: &[&str] = &["hwsets"];

/// A stored project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique key.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Identities allowed to move units for this project.
    #[serde(default)]
    pub authorized_users: BTreeSet<String>,
    /// Hardware sets this project may draw from.
    #[serde(default)]
    pub hardware_sets: BTreeSet<HwSetId>,
    /// Creation timestamp (microseconds since epoch).
    #[serde(default)]
    pub created_at: u64,
}

impl Project {
    /// A new project whose only member is its creator.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        hardware_sets: impl IntoIterator<Item = HwSetId>,
        creator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            authorized_users: BTreeSet::from([creator.into()]),
            hardware_sets: hardware_sets.into_iter().collect(),
            created_at: crate::time::now_micros(),
        }
    }

    pub fn is_member(&self, identity: &str) -> bool {
        self.authorized_users.contains(identity)
    }

    pub fn is_assigned(&self, hwset: &HwSetId) -> bool {
        self.hardware_sets.contains(hwset)
    }
}

/// Validate a project name: non-blank, bounded, printable and not a route word.
pub fn validate_project_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(InventoryError::InvalidInput(
            "project name is required".into(),
        ));
    }
    if name.len() > MAX_PROJECT_NAME_LEN {
        return Err(InventoryError::InvalidInput(format!(
            "project name longer than {MAX_PROJECT_NAME_LEN} bytes"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(InventoryError::InvalidInput(
            "project name contains control characters".into(),
        ));
    }
    if RESERVED_PROJECT_NAMES.contains(&name) {
        return Err(InventoryError::InvalidInput(format!(
            "project name is reserved: {name}"
        )));
    }
    Ok(())
}

/// A project with its hardware set references resolved to full records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    pub name: String,
    pub description: String,
    pub authorized_users: BTreeSet<String>,
    pub hardware_sets: Vec<HardwareSet>,
    /// References that did not resolve at read time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<HwSetId>,
    pub created_at: u64,
}

impl ProjectView {
    /// Join a project with a lookup over the current hardware sets.
    pub fn resolve<F>(project: Project, mut lookup: F) -> Self
    where
        F: FnMut(&HwSetId) -> Option<HardwareSet>,
    {
        let mut hardware_sets = Vec::with_capacity(project.hardware_sets.len());
        let mut unresolved = Vec::new();
        for id in &project.hardware_sets {
            match lookup(id) {
                Some(set) => hardware_sets.push(set),
                None => unresolved.push(id.clone()),
            }
        }
        Self {
            name: project.name,
            description: project.description,
            authorized_users: project.authorized_users,
            hardware_sets,
            unresolved,
            created_at: project.created_at,
        }
    }
}

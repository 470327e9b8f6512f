//! Authorization gate.
//!
//! A read-only probe answering "may this caller act on this project?". The
//! store re-checks membership inside the atomic quantity update, so the
//! snapshot returned here is only used for precise error reporting.

use log::debug;

use crate::error::{InventoryError, Result};
use crate::identity::Caller;
use crate::model::Project;
use crate::store::InventoryStore;

/// Return the project if `caller` is one of its authorized users.
///
/// # Errors
///
/// `NotFound` if the project does not exist, `Forbidden` if the caller is
/// not a member.
pub fn authorize<S: InventoryStore + ?Sized>(
    store: &S,
    project: &str,
    caller: &Caller,
) -> Result<Project> {
    let record = store
        .get_project(project)?
        .ok_or_else(|| InventoryError::NotFound(format!("project not found: {project}")))?;
    if !record.is_member(caller.identity()) {
        debug!("{caller} denied on project {project}");
        return Err(InventoryError::Forbidden {
            project: project.to_string(),
            identity: caller.identity().to_string(),
        });
    }
    Ok(record)
}

//! Records held by the inventory store.
//!
//! Quantities live only on [`HardwareSet`]. A [`Project`] carries membership
//! and the set of hardware sets it may draw from, never a count of its own.

pub mod hwset;
pub mod project;

pub use hwset::{HardwareSet, HwSetId, QuantityViolation};
pub use project::{Project, ProjectView};

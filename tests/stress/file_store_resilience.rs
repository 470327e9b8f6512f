//! Resilience tests for the JSON file store: interrupted writes, corrupt
//! or foreign documents, vanished directories, and large inventories.

use std::fs;
use std::path::Path;

use lab_inventory::{
    AllocationEngine, AllocationGuard, Caller, FileStore, HardwareSet, HwSetId, InventoryError,
    InventoryStore, MembershipChange, Project,
};

fn id(raw: &str) -> HwSetId {
    HwSetId::parse(raw).unwrap()
}

fn project_file(dir: &Path, name: &str) -> std::path::PathBuf {
    let stem = bs58::encode(name.as_bytes()).into_string();
    dir.join("projects").join(format!("{stem}.json"))
}

fn seeded(dir: &Path) -> FileStore {
    let store = FileStore::open(dir).unwrap();
    store
        .insert_hwset(HardwareSet::new(id("HWSet1"), "Scopes", 100).with_available(50))
        .unwrap();
    store
        .insert_project(Project::new("Project 1", "", [id("HWSet1")], "alice"))
        .unwrap();
    store
}

#[test]
fn resilience_leftover_temp_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded(dir.path());

    // A crash between write and rename leaves a half-written sibling.
    fs::write(dir.path().join("hwsets").join("HWSet1.json.tmp"), b"{\"ver").unwrap();
    fs::write(dir.path().join("projects").join("junk.json.tmp"), b"").unwrap();

    assert_eq!(store.list_hwsets().unwrap().len(), 1);
    assert_eq!(store.list_projects().unwrap().len(), 1);

    // The next write simply replaces the stale temp file.
    let engine = AllocationEngine::new(store);
    let out = engine
        .checkout("Project 1", &id("HWSet1"), 5, &Caller::trusted("alice"))
        .unwrap();
    assert_eq!(out.available, 45);
    assert!(!dir.path().join("hwsets").join("HWSet1.json.tmp").exists());
}

#[test]
fn resilience_corrupt_hwset_is_reported_not_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded(dir.path());
    let path = dir.path().join("hwsets").join("HWSet1.json");
    fs::write(&path, b"{ not json").unwrap();

    let engine = AllocationEngine::new(store);
    let err = engine
        .checkout("Project 1", &id("HWSet1"), 1, &Caller::trusted("alice"))
        .unwrap_err();
    assert!(matches!(err, InventoryError::InvalidFileFormat(_)));
    assert_eq!(err.status_code(), 500);
    assert!(matches!(
        engine.list_hardware_sets(),
        Err(InventoryError::InvalidFileFormat(_))
    ));
    assert_eq!(fs::read(&path).unwrap(), b"{ not json");
}

#[test]
fn resilience_unknown_version_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded(dir.path());
    let path = dir.path().join("hwsets").join("HWSet1.json");
    let mut doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    doc["version"] = 99.into();
    fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

    assert!(matches!(
        store.get_hwset(&id("HWSet1")),
        Err(InventoryError::InvalidFileFormat(_))
    ));
}

#[test]
fn resilience_legacy_project_document_rejected() {
    // Per-project quantities only enter through the seed importer.
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    fs::write(
        project_file(dir.path(), "Old"),
        br#"{"version": 1, "project": {"name": "Old", "authorized_users": [],
             "hardware_sets": {"HWSet1": {"capacity": 100, "available": 0}}}}"#,
    )
    .unwrap();
    assert!(matches!(
        store.get_project("Old"),
        Err(InventoryError::InvalidFileFormat(_))
    ));
}

#[test]
fn resilience_hand_edited_document_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path()).unwrap();
    fs::write(
        project_file(dir.path(), "Minimal"),
        br#"{"version": 1, "project": {"name": "Minimal"}}"#,
    )
    .unwrap();
    let project = store.get_project("Minimal").unwrap().unwrap();
    assert!(project.authorized_users.is_empty());
    assert!(project.hardware_sets.is_empty());
    assert_eq!(
        store.add_member("Minimal", "alice").unwrap(),
        MembershipChange::Applied
    );
}

#[cfg(unix)]
#[test]
fn resilience_removed_directory_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded(dir.path());
    fs::remove_dir_all(dir.path().join("hwsets")).unwrap();

    let err = store.list_hwsets().unwrap_err();
    assert!(matches!(err, InventoryError::StorageUnavailable(_)));
    assert!(err.is_retryable());
    assert_eq!(err.status_code(), 503);

    let err = store
        .insert_hwset(HardwareSet::new(id("HWSet2"), "Probes", 1))
        .unwrap_err();
    assert!(matches!(err, InventoryError::StorageUnavailable(_)));
}

#[test]
fn resilience_refused_adjust_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded(dir.path());
    let path = dir.path().join("hwsets").join("HWSet1.json");
    let before = fs::read(&path).unwrap();

    let guard = AllocationGuard::new("Project 1", "mallory");
    let outcome = store.adjust_available(&id("HWSet1"), -1, &guard).unwrap();
    assert_eq!(outcome, lab_inventory::AdjustOutcome::NotMember);

    let guard = AllocationGuard::new("Project 1", "alice");
    let outcome = store.adjust_available(&id("HWSet1"), 51, &guard).unwrap();
    assert!(matches!(
        outcome,
        lab_inventory::AdjustOutcome::WouldExceedCapacity { .. }
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn resilience_many_records_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path()).unwrap();
        for i in 0..200 {
            store
                .insert_hwset(HardwareSet::new(id(&format!("set-{i:03}")), "bulk", i))
                .unwrap();
        }
        for i in 0..100 {
            let hwsets = [id(&format!("set-{i:03}")), id(&format!("set-{:03}", i + 100))];
            store
                .insert_project(Project::new(format!("Project {i}"), "", hwsets, "owner"))
                .unwrap();
        }
    }

    let engine = AllocationEngine::new(FileStore::open(dir.path()).unwrap());
    let hwsets = engine.list_hardware_sets().unwrap();
    assert_eq!(hwsets.len(), 200);
    assert!(hwsets.windows(2).all(|w| w[0].id < w[1].id));

    let projects = engine.list_projects().unwrap();
    assert_eq!(projects.len(), 100);
    assert!(projects.iter().all(|p| p.hardware_sets.len() == 2));
    assert!(projects.iter().all(|p| p.unresolved.is_empty()));
}

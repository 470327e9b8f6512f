//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle:
//! 1. Seed hardware sets from the legacy per-project layout
//! 2. Register users and log in
//! 3. Create a project and manage membership
//! 4. Check hardware in and out within capacity
//! 5. Reopen the file store and confirm state survived

use std::sync::Arc;
use std::time::Duration;

use lab_inventory::seed::{import_legacy_projects, parse_legacy_projects};
use lab_inventory::{
    AccountService, AllocationEngine, Caller, FileCredentialStore, FileStore, HwSetId,
    InventoryError, InventoryStore, MembershipChange, MemoryCredentialStore, MemoryStore,
    TokenIssuer,
};

const LEGACY: &str = r#"[
    { "name": "Project 1", "authorized_users": ["alice", "bob"],
      "hardware_sets": { "HWSet1": {"capacity": 100, "available": 100},
                         "HWSet2": {"capacity": 50,  "available": 50} } },
    { "name": "Project 2", "authorized_users": ["carol", "dave"],
      "hardware_sets": { "HWSet1": {"capacity": 100, "available": 50},
                         "HWSet2": {"capacity": 100, "available": 100} } },
    { "name": "Project 3", "authorized_users": [],
      "hardware_sets": { "HWSet1": {"capacity": 100, "available": 0},
                         "HWSet2": {"capacity": 100, "available": 0} } }
]"#;

fn id(raw: &str) -> HwSetId {
    HwSetId::parse(raw).unwrap()
}

/// Drive the whole lifecycle against any store.
fn run_workflow<S: InventoryStore>(engine: &AllocationEngine<S>) {
    // ── Step 1: Seed ─────────────────────────────────────────────────────
    let legacy = parse_legacy_projects(LEGACY).unwrap();
    let report = import_legacy_projects(engine.store(), &legacy).unwrap();
    assert_eq!(report.hwsets_created, 2);
    assert_eq!(report.projects_created, 3);
    assert!(!report.discrepancies.is_empty());

    let h1 = id("HWSet1");
    let h2 = id("HWSet2");

    // ── Step 2: Existing members move units ──────────────────────────────
    let alice = Caller::trusted("alice");
    let bob = Caller::trusted("bob");
    let erin = Caller::trusted("erin");

    let out = engine.checkout("Project 1", &h1, 30, &alice).unwrap();
    assert_eq!((out.available, out.capacity), (70, 100));
    let out = engine.checkout("Project 1", &h2, 50, &bob).unwrap();
    assert_eq!(out.available, 0);

    // Pool is shared: Project 2 sees the same HWSet2 record.
    assert!(matches!(
        engine.checkout("Project 2", &h2, 1, &Caller::trusted("carol")),
        Err(InventoryError::InsufficientAvailable { available: 0, .. })
    ));

    // ── Step 3: Create, join, leave ──────────────────────────────────────
    let project = engine
        .create_project("Erin's bench", ["HWSet1"], "bring-up", &erin)
        .unwrap();
    assert!(project.is_member("erin"));

    assert!(matches!(
        engine.checkout("Erin's bench", &h1, 1, &alice),
        Err(InventoryError::Forbidden { .. })
    ));
    assert_eq!(
        engine.join("Erin's bench", &alice).unwrap(),
        MembershipChange::Applied
    );
    engine.checkout("Erin's bench", &h1, 10, &alice).unwrap();

    // Not assigned to the new project.
    assert!(matches!(
        engine.checkout("Erin's bench", &h2, 1, &erin),
        Err(InventoryError::NotAssigned { .. })
    ));

    // ── Step 4: Capacity bounds ──────────────────────────────────────────
    assert_eq!(engine.store().get_hwset(&h1).unwrap().unwrap().available, 60);
    assert!(matches!(
        engine.checkin("Project 1", &h1, 41, &alice),
        Err(InventoryError::CapacityExceeded { .. })
    ));
    let out = engine.checkin("Project 1", &h1, 40, &alice).unwrap();
    assert_eq!(out.available, 100);

    engine.leave("Erin's bench", &alice).unwrap();
    assert!(matches!(
        engine.checkin("Erin's bench", &h1, 1, &alice),
        Err(InventoryError::Forbidden { .. })
    ));

    // ── Step 5: Views ────────────────────────────────────────────────────
    let projects = engine.list_projects().unwrap();
    assert_eq!(projects.len(), 4);
    let view = engine.get_project("Project 1").unwrap();
    assert_eq!(view.hardware_sets.len(), 2);
    assert_eq!(view.hardware_sets[1].available, 0);
}

#[test]
fn full_workflow_memory_store() {
    let engine = AllocationEngine::new(MemoryStore::new());
    run_workflow(&engine);
}

#[test]
fn full_workflow_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let engine = AllocationEngine::new(FileStore::open(dir.path()).unwrap());
        run_workflow(&engine);
    }

    let engine = AllocationEngine::new(FileStore::open(dir.path()).unwrap());
    let h1 = engine.store().get_hwset(&id("HWSet1")).unwrap().unwrap();
    assert_eq!(h1.available, 100);
    let h2 = engine.store().get_hwset(&id("HWSet2")).unwrap().unwrap();
    assert_eq!(h2.available, 0);

    let bench = engine.get_project("Erin's bench").unwrap();
    assert_eq!(bench.authorized_users.len(), 1);
    assert!(bench.authorized_users.contains("erin"));
}

#[test]
fn full_workflow_tokens_drive_engine() {
    let issuer = Arc::new(TokenIssuer::generate(Duration::from_secs(300)));
    let accounts = AccountService::new(MemoryCredentialStore::new(), Arc::clone(&issuer));
    let engine = AllocationEngine::new(MemoryStore::new());
    engine
        .store()
        .insert_hwset(lab_inventory::HardwareSet::new(id("scope"), "Scopes", 5))
        .unwrap();

    accounts.register("frank", "correct horse").unwrap();
    let token = accounts.login("frank", "correct horse").unwrap();
    let frank = accounts.authenticate(&token).unwrap();
    assert_eq!(frank.identity(), "frank");

    engine
        .create_project("Frank's", ["scope"], "", &frank)
        .unwrap();
    let out = engine.checkout("Frank's", &id("scope"), 5, &frank).unwrap();
    assert_eq!(out.available, 0);

    // A token from a different issuer is worthless here.
    let stranger = TokenIssuer::generate(Duration::from_secs(300))
        .issue("frank")
        .unwrap();
    assert!(matches!(
        accounts.authenticate(&stranger),
        Err(InventoryError::Unauthenticated(_))
    ));
}

#[test]
fn full_workflow_file_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let issuer = Arc::new(TokenIssuer::generate(Duration::from_secs(300)));
    {
        let accounts = AccountService::new(
            FileCredentialStore::open(dir.path()).unwrap(),
            Arc::clone(&issuer),
        );
        accounts.register("gina", "pw").unwrap();
    }
    let accounts = AccountService::new(FileCredentialStore::open(dir.path()).unwrap(), issuer);
    assert!(matches!(
        accounts.register("gina", "other"),
        Err(InventoryError::Conflict(_))
    ));
    let token = accounts.login("gina", "pw").unwrap();
    assert_eq!(accounts.authenticate(&token).unwrap().identity(), "gina");
}

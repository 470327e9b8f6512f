//! Edge case tests: quantity boundaries, identifier validation, unusual
//! project names, and tokens that must never verify.

use std::time::Duration;

use lab_inventory::{
    AllocationEngine, Caller, HardwareSet, HwSetId, InventoryError, InventoryStore, MemoryStore,
    TokenIssuer,
};

fn id(raw: &str) -> HwSetId {
    HwSetId::parse(raw).unwrap()
}

fn engine_with(capacity: u64, available: u64) -> AllocationEngine<MemoryStore> {
    let store = MemoryStore::new();
    store
        .insert_hwset(HardwareSet::new(id("h"), "H", capacity).with_available(available))
        .unwrap();
    let engine = AllocationEngine::new(store);
    engine
        .create_project("P", ["h"], "", &Caller::trusted("alice"))
        .unwrap();
    engine
}

fn available(engine: &AllocationEngine<MemoryStore>) -> u64 {
    engine.store().get_hwset(&id("h")).unwrap().unwrap().available
}

// ── Quantity boundaries ───────────────────────────────────────────────────────

#[test]
fn edge_checkout_exactly_available() {
    let engine = engine_with(10, 7);
    let alice = Caller::trusted("alice");
    assert_eq!(engine.checkout("P", &id("h"), 7, &alice).unwrap().available, 0);
    assert!(matches!(
        engine.checkout("P", &id("h"), 1, &alice),
        Err(InventoryError::InsufficientAvailable { available: 0, .. })
    ));
}

#[test]
fn edge_checkin_exactly_to_capacity() {
    let engine = engine_with(10, 3);
    let alice = Caller::trusted("alice");
    assert_eq!(engine.checkin("P", &id("h"), 7, &alice).unwrap().available, 10);
    assert!(matches!(
        engine.checkin("P", &id("h"), 1, &alice),
        Err(InventoryError::CapacityExceeded { capacity: 10, .. })
    ));
}

#[test]
fn edge_zero_capacity_set() {
    let engine = engine_with(0, 0);
    let alice = Caller::trusted("alice");
    assert!(engine.checkout("P", &id("h"), 1, &alice).is_err());
    assert!(engine.checkin("P", &id("h"), 1, &alice).is_err());
    assert_eq!(available(&engine), 0);
}

#[test]
fn edge_huge_capacity_no_overflow() {
    let engine = engine_with(u64::MAX, u64::MAX - 5);
    let alice = Caller::trusted("alice");
    assert_eq!(
        engine.checkin("P", &id("h"), 5, &alice).unwrap().available,
        u64::MAX
    );
    assert!(matches!(
        engine.checkin("P", &id("h"), i64::MAX as u64, &alice),
        Err(InventoryError::CapacityExceeded { .. })
    ));
    assert!(matches!(
        engine.checkin("P", &id("h"), i64::MAX as u64 + 1, &alice),
        Err(InventoryError::InvalidInput(_))
    ));
    assert_eq!(available(&engine), u64::MAX);
}

#[test]
fn edge_failed_moves_leave_store_unchanged() {
    let engine = engine_with(100, 50);
    let alice = Caller::trusted("alice");
    let bob = Caller::trusted("bob");
    let _ = engine.checkout("P", &id("h"), 51, &alice);
    let _ = engine.checkin("P", &id("h"), 51, &alice);
    let _ = engine.checkout("P", &id("h"), 1, &bob);
    let _ = engine.checkout("P", &id("h"), 0, &alice);
    let _ = engine.checkout("Q", &id("h"), 1, &alice);
    assert_eq!(available(&engine), 50);
}

#[test]
fn edge_inconsistent_hwset_rejected_by_store() {
    let store = MemoryStore::new();
    assert!(matches!(
        store.insert_hwset(HardwareSet::new(id("h"), "H", 5).with_available(6)),
        Err(InventoryError::InvalidInput(_))
    ));
    store.insert_hwset(HardwareSet::new(id("h"), "H", 5)).unwrap();
    assert!(matches!(
        store.insert_hwset(HardwareSet::new(id("h"), "Other", 9)),
        Err(InventoryError::Conflict(_))
    ));
}

// ── Identifiers and names ─────────────────────────────────────────────────────

#[test]
fn edge_hwset_id_alphabet() {
    let longest = "x".repeat(64);
    let too_long = "x".repeat(65);
    for ok in ["a", "HWSet1", "scope_2.rev-b", longest.as_str()] {
        assert!(HwSetId::parse(ok).is_ok(), "{ok} should parse");
    }
    for bad in ["", ".", "..", "a b", "a/b", "ünï", "a\0", too_long.as_str()] {
        assert!(
            matches!(HwSetId::parse(bad), Err(InventoryError::InvalidInput(_))),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn edge_hwset_id_in_json_is_validated() {
    let bad: Result<HardwareSet, _> = serde_json::from_str(
        r#"{"id": "../etc", "name": "x", "capacity": 1, "available": 1}"#,
    );
    assert!(bad.is_err());
}

#[test]
fn edge_unusual_project_names() {
    let store = MemoryStore::new();
    store.insert_hwset(HardwareSet::new(id("h"), "H", 1)).unwrap();
    let engine = AllocationEngine::new(store);
    let alice = Caller::trusted("alice");

    for name in ["Project 1", "ünïcödé 🚀", "a/b\\c", "..", "名前"] {
        engine.create_project(name, ["h"], "", &alice).unwrap();
        assert_eq!(engine.get_project(name).unwrap().name, name);
    }
    let too_long = "n".repeat(129);
    for bad in ["", "   ", "tab\tname", too_long.as_str()] {
        assert!(
            matches!(
                engine.create_project(bad, ["h"], "", &alice),
                Err(InventoryError::InvalidInput(_))
            ),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn edge_project_without_hwsets() {
    let engine = AllocationEngine::new(MemoryStore::new());
    let alice = Caller::trusted("alice");
    let empty: [&str; 0] = [];
    let project = engine.create_project("Empty", empty, "", &alice).unwrap();
    assert!(project.hardware_sets.is_empty());
    let view = engine.get_project("Empty").unwrap();
    assert!(view.hardware_sets.is_empty());
}

// ── Tokens ────────────────────────────────────────────────────────────────────

#[test]
fn edge_tokens_that_never_verify() {
    let issuer = TokenIssuer::generate(Duration::from_secs(60));
    let token = issuer.issue("alice").unwrap();
    let (payload, signature) = token.split_once('.').unwrap();

    let mut flipped = signature.to_string();
    let first = flipped.remove(0);
    flipped.insert(0, if first == 'A' { 'B' } else { 'A' });

    let forged_payload = {
        use base64::Engine;
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"sub":"mallory","iat":0,"exp":18446744073709551615}"#)
    };

    for bad in [
        String::new(),
        ".".to_string(),
        "no-dot".to_string(),
        format!("{payload}."),
        format!(".{signature}"),
        format!("{payload}.{flipped}"),
        format!("{forged_payload}.{signature}"),
        format!("{token}.extra"),
    ] {
        assert!(
            matches!(issuer.verify(&bad), Err(InventoryError::Unauthenticated(_))),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn edge_token_time_window() {
    let issuer = TokenIssuer::generate(Duration::from_secs(10));
    let token = issuer.issue_at("alice", 1_000_000).unwrap();
    assert!(issuer.verify_at(&token, 1_000_000).is_ok());
    assert!(issuer.verify_at(&token, 10_999_999).is_ok());
    assert!(issuer.verify_at(&token, 11_000_000).is_err());
    assert!(issuer.verify_at(&token, 999_999).is_err());
    assert!(issuer.issue("").is_err());
}

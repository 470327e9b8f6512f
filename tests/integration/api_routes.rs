//! Integration test: the JSON route table.
//!
//! Every route and the status codes it can produce, driven through
//! `Api::handle` over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use lab_inventory::{
    AccountService, AllocationEngine, Api, ApiRequest, ApiResponse, HardwareSet, HwSetId,
    InventoryStore, MemoryCredentialStore, MemoryStore, Method, TokenIssuer,
};

type TestApi = Api<MemoryStore, MemoryCredentialStore>;

/// h1 {capacity 100, available 50}, h2 {capacity 10, available 10}.
fn api() -> TestApi {
    let store = MemoryStore::new();
    store
        .insert_hwset(
            HardwareSet::new(HwSetId::parse("h1").unwrap(), "Scopes", 100).with_available(50),
        )
        .unwrap();
    store
        .insert_hwset(HardwareSet::new(HwSetId::parse("h2").unwrap(), "Probes", 10))
        .unwrap();
    let issuer = Arc::new(TokenIssuer::generate(Duration::from_secs(300)));
    Api::new(
        AllocationEngine::new(store),
        AccountService::new(MemoryCredentialStore::new(), issuer),
    )
}

fn register_and_login(api: &TestApi, user: &str) -> String {
    let creds = json!({"username": user, "password": "pw"});
    let resp = api.handle(&ApiRequest::post("/register", creds.clone()));
    assert_eq!(resp.status, 200, "{:?}", resp.body);
    let resp = api.handle(&ApiRequest::post("/login", creds));
    assert_eq!(resp.status, 200, "{:?}", resp.body);
    assert!(resp.body["message"].is_string());
    resp.body["token"].as_str().unwrap().to_string()
}

fn get(api: &TestApi, path: &str, token: &str) -> ApiResponse {
    api.handle(&ApiRequest::get(path).with_bearer(token))
}

fn post(api: &TestApi, path: &str, token: &str, body: Value) -> ApiResponse {
    api.handle(&ApiRequest::post(path, body).with_bearer(token))
}

fn assert_error(resp: &ApiResponse, status: u16, kind: &str) {
    assert_eq!(resp.status, status, "body: {}", resp.body);
    assert_eq!(resp.body["error"], kind, "body: {}", resp.body);
    assert!(resp.body["message"].is_string());
}

#[test]
fn accounts_routes() {
    let api = api();
    let creds = json!({"username": "alice", "password": "pw"});
    assert_eq!(api.handle(&ApiRequest::post("/register", creds.clone())).status, 200);
    assert_error(
        &api.handle(&ApiRequest::post("/register", creds)),
        409,
        "conflict",
    );
    assert_error(
        &api.handle(&ApiRequest::post("/register", json!({"username": "x"}))),
        400,
        "invalid_input",
    );
    assert_error(
        &api.handle(&ApiRequest::post(
            "/login",
            json!({"username": "alice", "password": "nope"}),
        )),
        401,
        "unauthenticated",
    );
    assert_error(
        &api.handle(&ApiRequest::post(
            "/login",
            json!({"username": "zed", "password": "pw"}),
        )),
        404,
        "not_found",
    );
}

#[test]
fn token_is_required() {
    let api = api();
    assert_error(&api.handle(&ApiRequest::get("/projects")), 401, "unauthenticated");
    assert_error(&get(&api, "/projects", "garbage"), 401, "unauthenticated");
    assert_error(
        &api.handle(&ApiRequest::post("/projects/P1/join", Value::Null)),
        401,
        "unauthenticated",
    );
}

#[test]
fn expired_token_is_rejected() {
    let api = api();
    let creds = json!({"username": "alice", "password": "pw"});
    api.handle(&ApiRequest::post("/register", creds));
    let token = api.accounts().issuer().issue_at("alice", 1).unwrap();
    assert_error(&get(&api, "/projects", &token), 401, "unauthenticated");
}

#[test]
fn unknown_routes_and_methods() {
    let api = api();
    let token = register_and_login(&api, "alice");
    assert_eq!(get(&api, "/nothing", &token).status, 404);
    assert_eq!(get(&api, "/projects/P1/hwsets/h1/lend", &token).status, 404);
    assert_eq!(get(&api, "/login", &token).status, 405);
    assert_eq!(post(&api, "/projects/hwsets", &token, json!({})).status, 405);
    assert_eq!(get(&api, "/projects/P1/join", &token).status, 405);

    let mut request = ApiRequest::get("/projects").with_bearer(&token);
    request.method = Method::Post;
    request.body = json!({});
    assert_error(&api.handle(&request), 400, "invalid_input");
}

#[test]
fn project_lifecycle_routes() {
    let api = api();
    let alice = register_and_login(&api, "alice");
    let bob = register_and_login(&api, "bob");

    let resp = post(
        &api,
        "/projects",
        &alice,
        json!({"name": "Bench One", "hardware_sets": ["h1"], "description": "scopes"}),
    );
    assert_eq!(resp.status, 201, "{}", resp.body);
    assert_eq!(resp.body["project"]["authorized_users"], json!(["alice"]));

    assert_error(
        &post(&api, "/projects", &bob, json!({"name": "Bench One"})),
        409,
        "conflict",
    );
    assert_error(
        &post(&api, "/projects", &bob, json!({"name": "X", "hardware_sets": ["nope"]})),
        400,
        "invalid_input",
    );
    assert_error(
        &post(&api, "/projects", &bob, json!({"name": "  "})),
        400,
        "invalid_input",
    );
    // The listing route owns this path segment.
    assert_error(
        &post(&api, "/projects", &bob, json!({"name": "hwsets"})),
        400,
        "invalid_input",
    );

    // Percent-encoded names resolve.
    let resp = get(&api, "/projects/Bench%20One", &bob);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["hardware_sets"][0]["id"], "h1");
    assert_eq!(resp.body["hardware_sets"][0]["available"], 50);
    assert_error(&get(&api, "/projects/Nope", &bob), 404, "not_found");

    let resp = get(&api, "/projects", &bob);
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body.as_array().unwrap().len(), 1);

    let resp = get(&api, "/projects/hwsets", &bob);
    assert_eq!(resp.status, 200);
    let ids: Vec<&str> = resp
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["h1", "h2"]);

    // Join / leave always answer 200 with a message.
    for path in [
        "/projects/Bench%20One/join",
        "/projects/Bench%20One/join",
        "/projects/Ghost/join",
        "/projects/Ghost/leave",
    ] {
        let resp = post(&api, path, &bob, Value::Null);
        assert_eq!(resp.status, 200, "{path}: {}", resp.body);
        assert!(resp.body["message"].is_string());
    }
}

#[test]
fn checkin_checkout_routes() {
    let api = api();
    let alice = register_and_login(&api, "alice");
    let bob = register_and_login(&api, "bob");
    post(&api, "/projects", &alice, json!({"name": "P1", "hardware_sets": ["h1"]}));

    let checkin = "/projects/P1/hwsets/h1/checkin";
    let checkout = "/projects/P1/hwsets/h1/checkout";

    assert_error(
        &post(&api, checkin, &alice, json!({"qty": 60})),
        400,
        "capacity_exceeded",
    );
    let resp = post(&api, checkin, &alice, json!({"qty": 40}));
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body["available"], 90);
    assert_eq!(resp.body["capacity"], 100);

    assert_error(
        &post(&api, checkout, &alice, json!({"qty": 95})),
        400,
        "insufficient_available",
    );
    let resp = post(&api, checkout, &alice, json!({"qty": 90}));
    assert_eq!(resp.body["available"], 0);

    assert_error(&post(&api, checkin, &bob, json!({"qty": 1})), 403, "forbidden");
    post(&api, "/projects/P1/join", &bob, Value::Null);
    assert_eq!(post(&api, checkin, &bob, json!({"qty": 1})).status, 200);

    for bad in [json!({}), json!({"qty": 0}), json!({"qty": -5}), json!({"qty": "3"})] {
        assert_error(&post(&api, checkin, &bob, bad), 400, "invalid_input");
    }

    assert_error(
        &post(&api, "/projects/P1/hwsets/h2/checkout", &bob, json!({"qty": 1})),
        404,
        "not_assigned",
    );
    assert_error(
        &post(&api, "/projects/P1/hwsets/bad%20id/checkout", &bob, json!({"qty": 1})),
        400,
        "invalid_input",
    );
    assert_error(
        &post(&api, "/projects/P9/hwsets/h1/checkout", &bob, json!({"qty": 1})),
        404,
        "not_found",
    );

    let h1 = api
        .engine()
        .store()
        .get_hwset(&HwSetId::parse("h1").unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(h1.available, 1);
}

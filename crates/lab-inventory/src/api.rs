//! Request dispatcher — the JSON route table over the engine and accounts.
//!
//! Transport-agnostic: callers build an [`ApiRequest`] from whatever framing
//! they speak and get back an [`ApiResponse`]. Errors always render as
//! `{"error": <kind>, "message": <text>}` with the status from
//! [`InventoryError::status_code`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::account::{AccountService, CredentialStore, FileCredentialStore};
use crate::config::Config;
use crate::engine::AllocationEngine;
use crate::error::{InventoryError, Result};
use crate::identity::{load_or_create_issuer_key, Caller, TokenIssuer};
use crate::model::HwSetId;
use crate::store::{FileStore, InventoryStore, MembershipChange};

// ── Request / response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl FromStr for Method {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            other => Err(InventoryError::InvalidInput(format!(
                "unsupported method: {other}"
            ))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Bearer token, without the `Bearer ` prefix.
    pub bearer: Option<String>,
    pub body: Value,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            bearer: None,
            body: Value::Null,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            bearer: None,
            body,
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    pub fn from_error(err: &InventoryError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.kind(), "message": err.to_string() }),
        }
    }

    fn route_not_found(path: &str) -> Self {
        Self {
            status: 404,
            body: json!({ "error": "not_found", "message": format!("no route for {path}") }),
        }
    }

    fn method_not_allowed(method: Method, path: &str) -> Self {
        Self {
            status: 405,
            body: json!({
                "error": "method_not_allowed",
                "message": format!("{method} not allowed on {path}"),
            }),
        }
    }
}

// ── Routing ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Checkin,
    Checkout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Login,
    Register,
    Projects,
    HwSets,
    Project(String),
    Join(String),
    Leave(String),
    Quantity {
        project: String,
        hwset: String,
        direction: Move,
    },
}

impl Route {
    /// Parse a path into a route. `Ok(None)` means no route matches.
    fn parse(path: &str) -> Result<Option<Self>> {
        let path = path.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(None);
        }
        let raw: Vec<&str> = trimmed.split('/').collect();
        if raw.iter().any(|s| s.is_empty()) {
            return Ok(None);
        }
        let segments = raw
            .into_iter()
            .map(percent_decode)
            .collect::<Result<Vec<_>>>()?;
        let seg: Vec<&str> = segments.iter().map(String::as_str).collect();

        let route = match seg.as_slice() {
            ["login"] => Self::Login,
            ["register"] => Self::Register,
            ["projects"] => Self::Projects,
            ["projects", "hwsets"] => Self::HwSets,
            ["projects", name] => Self::Project(name.to_string()),
            ["projects", name, "join"] => Self::Join(name.to_string()),
            ["projects", name, "leave"] => Self::Leave(name.to_string()),
            ["projects", name, "hwsets", hwset, action] => {
                let direction = match *action {
                    "checkin" => Move::Checkin,
                    "checkout" => Move::Checkout,
                    _ => return Ok(None),
                };
                Self::Quantity {
                    project: name.to_string(),
                    hwset: hwset.to_string(),
                    direction,
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(route))
    }

    fn allows(&self, method: Method) -> bool {
        match self {
            Self::Projects => true,
            Self::HwSets | Self::Project(_) => method == Method::Get,
            Self::Login
            | Self::Register
            | Self::Join(_)
            | Self::Leave(_)
            | Self::Quantity { .. } => method == Method::Post,
        }
    }
}

/// Decode `%XX` escapes in one path segment.
fn percent_decode(segment: &str) -> Result<String> {
    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| {
                    InventoryError::InvalidInput(format!("bad percent escape in {segment}"))
                })?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out)
        .map_err(|_| InventoryError::InvalidInput(format!("path segment is not UTF-8: {segment}")))
}

// ── Body helpers ──────────────────────────────────────────────────────────────

fn required_str<'a>(body: &'a Value, field: &str) -> Result<&'a str> {
    body.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| InventoryError::InvalidInput(format!("missing string field: {field}")))
}

fn optional_str<'a>(body: &'a Value, field: &str) -> Result<&'a str> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(InventoryError::InvalidInput(format!(
            "field {field} must be a string"
        ))),
    }
}

fn string_list(body: &Value, field: &str) -> Result<Vec<String>> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().map(str::to_string).ok_or_else(|| {
                    InventoryError::InvalidInput(format!("{field} must contain only strings"))
                })
            })
            .collect(),
        Some(_) => Err(InventoryError::InvalidInput(format!(
            "field {field} must be an array"
        ))),
    }
}

/// `qty` must be a JSON integer of at least one.
fn quantity(body: &Value) -> Result<u64> {
    let qty = body.get("qty").ok_or_else(|| {
        InventoryError::InvalidInput("missing field: qty".into())
    })?;
    match qty.as_u64() {
        Some(q) if q > 0 => Ok(q),
        _ => Err(InventoryError::InvalidInput(format!(
            "qty must be a positive integer, got {qty}"
        ))),
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| InventoryError::Serialization(e.to_string()))
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

/// The route table bound to an engine and an account service.
pub struct Api<S, C> {
    engine: AllocationEngine<S>,
    accounts: AccountService<C>,
}

impl Api<FileStore, FileCredentialStore> {
    /// File-backed stores and the persisted issuer key under `config.data_dir`.
    pub fn open(config: &Config) -> Result<Self> {
        let store = FileStore::open(config.inventory_dir())?;
        let credentials = FileCredentialStore::open(config.users_dir())?;
        let key_pair = load_or_create_issuer_key(&config.issuer_key_path())?;
        let issuer = Arc::new(TokenIssuer::new(key_pair, config.token_ttl()));
        Ok(Self::new(
            AllocationEngine::new(store),
            AccountService::new(credentials, issuer),
        ))
    }
}

impl<S: InventoryStore, C: CredentialStore> Api<S, C> {
    pub fn new(engine: AllocationEngine<S>, accounts: AccountService<C>) -> Self {
        Self { engine, accounts }
    }

    pub fn engine(&self) -> &AllocationEngine<S> {
        &self.engine
    }

    pub fn accounts(&self) -> &AccountService<C> {
        &self.accounts
    }

    /// Dispatch one request.
    pub fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let route = match Route::parse(&request.path) {
            Ok(Some(route)) => route,
            Ok(None) => return ApiResponse::route_not_found(&request.path),
            Err(e) => return ApiResponse::from_error(&e),
        };
        if !route.allows(request.method) {
            return ApiResponse::method_not_allowed(request.method, &request.path);
        }

        let response = match self.dispatch(&route, request) {
            Ok(response) => response,
            Err(e) => ApiResponse::from_error(&e),
        };
        debug!(
            "{} {} -> {}",
            request.method, request.path, response.status
        );
        response
    }

    fn authenticate(&self, request: &ApiRequest) -> Result<Caller> {
        let token = request
            .bearer
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| InventoryError::Unauthenticated("missing bearer token".into()))?;
        self.accounts.authenticate(token)
    }

    fn dispatch(&self, route: &Route, request: &ApiRequest) -> Result<ApiResponse> {
        let body = &request.body;
        let caller = || self.authenticate(request);
        match route {
            Route::Login => {
                let token = self
                    .accounts
                    .login(required_str(body, "username")?, required_str(body, "password")?)?;
                Ok(ApiResponse::ok(json!({
                    "message": "login successful",
                    "token": token,
                })))
            }
            Route::Register => {
                let username = required_str(body, "username")?;
                self.accounts
                    .register(username, required_str(body, "password")?)?;
                Ok(ApiResponse::ok(json!({
                    "message": format!("user {} registered", username.trim()),
                })))
            }
            Route::Projects if request.method == Method::Get => {
                caller()?;
                Ok(ApiResponse::ok(to_value(&self.engine.list_projects()?)?))
            }
            Route::Projects => {
                let caller = caller()?;
                let name = required_str(body, "name")?;
                let hwsets = string_list(body, "hardware_sets")?;
                let description = optional_str(body, "description")?;
                let project = self
                    .engine
                    .create_project(name, &hwsets, description, &caller)?;
                Ok(ApiResponse::created(json!({
                    "message": format!("project {} created", project.name),
                    "project": to_value(&project)?,
                })))
            }
            Route::HwSets => {
                caller()?;
                Ok(ApiResponse::ok(to_value(&self.engine.list_hardware_sets()?)?))
            }
            Route::Project(name) => {
                caller()?;
                Ok(ApiResponse::ok(to_value(&self.engine.get_project(name)?)?))
            }
            Route::Join(name) => {
                let caller = caller()?;
                let message = match self.engine.join(name, &caller)? {
                    MembershipChange::Applied => format!("{caller} joined {name}"),
                    MembershipChange::Unchanged => format!("{caller} is already in {name}"),
                    MembershipChange::ProjectMissing => format!("no project named {name}"),
                };
                Ok(ApiResponse::ok(json!({ "message": message })))
            }
            Route::Leave(name) => {
                let caller = caller()?;
                let message = match self.engine.leave(name, &caller)? {
                    MembershipChange::Applied => format!("{caller} left {name}"),
                    MembershipChange::Unchanged => format!("{caller} was not in {name}"),
                    MembershipChange::ProjectMissing => format!("no project named {name}"),
                };
                Ok(ApiResponse::ok(json!({ "message": message })))
            }
            Route::Quantity {
                project,
                hwset,
                direction,
            } => {
                let caller = caller()?;
                let qty = quantity(body)?;
                let hwset = HwSetId::parse(hwset)?;
                let (allocation, verb) = match direction {
                    Move::Checkin => (
                        self.engine.checkin(project, &hwset, qty, &caller)?,
                        "checked in",
                    ),
                    Move::Checkout => (
                        self.engine.checkout(project, &hwset, qty, &caller)?,
                        "checked out",
                    ),
                };
                Ok(ApiResponse::ok(json!({
                    "message": format!("{caller} {verb} {qty} from {hwset}"),
                    "hwset": allocation.hwset,
                    "available": allocation.available,
                    "capacity": allocation.capacity,
                })))
            }
        }
    }
}

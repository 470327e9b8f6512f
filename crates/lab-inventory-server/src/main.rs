//! Lab Inventory stdio server.
//!
//! Exposes the inventory route table over newline-delimited JSON.
//!
//! # Protocol
//!
//! Each stdin line is one request:
//!
//! ```json
//! {"id": 1, "method": "POST", "path": "/projects/P1/hwsets/HWSet1/checkout",
//!  "token": "<identity token>", "body": {"qty": 5}}
//! ```
//!
//! and produces exactly one stdout line:
//!
//! ```json
//! {"id": 1, "status": 200, "body": {"available": 45, "capacity": 100, ...}}
//! ```
//!
//! Lines that are not valid JSON get a 400 response with `"id": null`.
//! Logs go to stderr; stdout carries responses only.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{json, Value};

use lab_inventory::{
    Api, ApiRequest, ApiResponse, Config, CredentialStore, InventoryError, InventoryStore, Method,
};

/// Lab Inventory stdio server.
#[derive(Parser, Debug)]
#[command(name = "lab-inventory-server", version, about)]
struct Args {
    /// Data directory (default: $LAB_INVENTORY_DIR or ~/.lab-inventory)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log requests at INFO instead of WARN
    #[arg(short, long)]
    verbose: bool,
}

// ── Response helpers ──────────────────────────────────────────────────────────

fn response_line(id: Value, response: ApiResponse) -> Value {
    json!({
        "id": id,
        "status": response.status,
        "body": response.body,
    })
}

fn bad_request(id: Value, message: impl Into<String>) -> Value {
    let err = InventoryError::InvalidInput(message.into());
    response_line(id, ApiResponse::from_error(&err))
}

// ── Server ────────────────────────────────────────────────────────────────────

struct StdioServer<S, C> {
    api: Api<S, C>,
}

impl<S: InventoryStore, C: CredentialStore> StdioServer<S, C> {
    fn new(api: Api<S, C>) -> Self {
        Self { api }
    }

    /// Parse and answer one input line.
    fn handle_line(&self, line: &str) -> Value {
        match serde_json::from_str::<Value>(line) {
            Ok(request) => self.handle_request(request),
            Err(e) => bad_request(Value::Null, format!("parse error: {e}")),
        }
    }

    /// Route a decoded request to the dispatcher.
    fn handle_request(&self, request: Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = match request
            .get("method")
            .and_then(Value::as_str)
            .map(str::parse::<Method>)
        {
            Some(Ok(m)) => m,
            Some(Err(e)) => return response_line(id, ApiResponse::from_error(&e)),
            None => return bad_request(id, "missing method"),
        };
        let path = match request.get("path").and_then(Value::as_str) {
            Some(p) => p.to_string(),
            None => return bad_request(id, "missing path"),
        };
        let bearer = request
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string);
        let body = request.get("body").cloned().unwrap_or(Value::Null);

        let api_request = ApiRequest {
            method,
            path,
            bearer,
            body,
        };
        let response = self.api.handle(&api_request);
        if response.status >= 500 {
            tracing::warn!(
                method = %api_request.method,
                path = %api_request.path,
                status = response.status,
                "request failed"
            );
        } else {
            tracing::info!(
                method = %api_request.method,
                path = %api_request.path,
                status = response.status,
                "request handled"
            );
        }
        response_line(id, response)
    }

    /// Answer every line of `input` on `output` until EOF.
    fn serve<R: BufRead, W: Write>(&self, input: R, mut output: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = self.handle_line(trimmed);
            serde_json::to_writer(&mut output, &response)?;
            output.write_all(b"\n")?;
            output.flush()?;
        }
        Ok(())
    }
}

fn main() {
    let args = Args::parse();

    // stdout is reserved for responses.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if args.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        })
        .init();

    if let Err(e) = run(args) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::load(args.data_dir).context("failed to load configuration")?;
    let api = Api::open(&config)
        .with_context(|| format!("failed to open inventory at {}", config.data_dir.display()))?;
    tracing::info!(
        data_dir = %config.data_dir.display(),
        issuer = %api.accounts().issuer().fingerprint(),
        "lab inventory server ready"
    );

    let server = StdioServer::new(api);
    let stdin = io::stdin();
    let stdout = io::stdout();
    server
        .serve(stdin.lock(), stdout.lock())
        .context("stdio transport failed")
}

//! Lab Inventory CLI — `labinv` command.
//!
//! Local administration and scripting over the file-backed inventory:
//! seeding hardware sets, managing accounts and projects, and moving
//! hardware units in and out of the shared pool.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use lab_inventory::seed::{self, ImportReport, SeedDocument};
use lab_inventory::{
    Api, Caller, Config, FileCredentialStore, FileStore, HardwareSet, HwSetId, MembershipChange,
    ProjectView,
};

type FileApi = Api<FileStore, FileCredentialStore>;

// ── Input helpers ─────────────────────────────────────────────────────────────

/// Read a password from stdin. Only the trailing newline is stripped.
fn read_password() -> Result<String> {
    eprint!("Password: ");
    read_password_line(&mut std::io::stdin().lock())
}

/// Read one line; the reader is not drained past it.
fn read_password_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    let password = line.trim_end_matches(['\n', '\r']).to_string();
    if password.is_empty() {
        return Err(anyhow!("password cannot be empty"));
    }
    Ok(password)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render JSON")?
    );
    Ok(())
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// Lab Inventory CLI — shared hardware pools, projects, and checkin/checkout.
#[derive(Parser, Debug)]
#[command(
    name = "labinv",
    about = "Lab Inventory CLI",
    version,
    long_about = "labinv — Lab Inventory CLI\n\nSeed hardware sets, manage accounts and projects,\nand check hardware units in and out of the shared pool."
)]
struct Cli {
    /// Data directory (default: $LAB_INVENTORY_DIR or ~/.lab-inventory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Who a mutating command acts as.
#[derive(Args, Debug)]
struct Acting {
    /// Act with an identity token from `labinv login`
    #[arg(long, conflicts_with = "as_user")]
    token: Option<String>,

    /// Act as USER without a token (local administration)
    #[arg(long = "as", value_name = "USER")]
    as_user: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the data directory and the token issuer key
    Init,

    /// Import hardware sets and projects from a JSON file
    Seed {
        /// Seed document path
        file: PathBuf,

        /// The file uses the legacy per-project quantity layout
        #[arg(long)]
        legacy: bool,
    },

    /// Create an account (password read from stdin)
    Register {
        /// Username
        user: String,
    },

    /// Log in and print an identity token (password read from stdin)
    Login {
        /// Username
        user: String,
    },

    /// List hardware sets
    Hwsets,

    /// List projects
    Projects,

    /// Show one project
    Show {
        /// Project name
        name: String,
    },

    /// Create a project; the acting user becomes its first member
    Create {
        /// Project name
        name: String,

        /// Hardware set to assign (repeatable)
        #[arg(long = "hwset", value_name = "ID")]
        hwsets: Vec<String>,

        /// Project description
        #[arg(long, default_value = "")]
        description: String,

        #[command(flatten)]
        acting: Acting,
    },

    /// Join a project
    Join {
        /// Project name
        name: String,

        #[command(flatten)]
        acting: Acting,
    },

    /// Leave a project
    Leave {
        /// Project name
        name: String,

        #[command(flatten)]
        acting: Acting,
    },

    /// Return units to the pool
    Checkin {
        /// Project name
        project: String,
        /// Hardware set id
        hwset: String,
        /// Number of units
        qty: u64,

        #[command(flatten)]
        acting: Acting,
    },

    /// Take units from the pool
    Checkout {
        /// Project name
        project: String,
        /// Hardware set id
        hwset: String,
        /// Number of units
        qty: u64,

        #[command(flatten)]
        acting: Acting,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data_dir.clone()).context("failed to load configuration")?;
    debug!("using data directory {}", config.data_dir.display());
    let api = Api::open(&config)
        .with_context(|| format!("failed to open inventory at {}", config.data_dir.display()))?;
    let json = cli.json;

    match cli.command {
        Commands::Init => cmd_init(&api, &config, cli.verbose),
        Commands::Seed { file, legacy } => cmd_seed(&api, &file, legacy, json),
        Commands::Register { user } => cmd_register(&api, &user),
        Commands::Login { user } => cmd_login(&api, &user),
        Commands::Hwsets => cmd_hwsets(&api, json),
        Commands::Projects => cmd_projects(&api, json),
        Commands::Show { name } => cmd_show(&api, &name, json),
        Commands::Create {
            name,
            hwsets,
            description,
            acting,
        } => cmd_create(&api, &name, &hwsets, &description, &acting, json),
        Commands::Join { name, acting } => cmd_membership(&api, &name, &acting, true),
        Commands::Leave { name, acting } => cmd_membership(&api, &name, &acting, false),
        Commands::Checkin {
            project,
            hwset,
            qty,
            acting,
        } => cmd_move(&api, &project, &hwset, qty, &acting, true, json),
        Commands::Checkout {
            project,
            hwset,
            qty,
            acting,
        } => cmd_move(&api, &project, &hwset, qty, &acting, false, json),
    }
}

fn caller(api: &FileApi, acting: &Acting) -> Result<Caller> {
    match (&acting.token, &acting.as_user) {
        (Some(token), _) => api
            .accounts()
            .authenticate(token.trim())
            .context("token rejected"),
        (None, Some(user)) => {
            let user = user.trim();
            if user.is_empty() {
                return Err(anyhow!("--as requires a user name"));
            }
            Ok(Caller::trusted(user))
        }
        (None, None) => Err(anyhow!("this command needs --token <TOKEN> or --as <USER>")),
    }
}

// ── Command implementations ───────────────────────────────────────────────────

/// `labinv init`
fn cmd_init(api: &FileApi, config: &Config, verbose: bool) -> Result<()> {
    println!("Inventory ready at {}", config.data_dir.display());
    println!("  Issuer: {}", api.accounts().issuer().fingerprint());
    if verbose {
        println!("  Key:    {}", config.issuer_key_path().display());
        println!("  Token TTL: {}s", config.token_ttl_secs);
    }
    Ok(())
}

/// `labinv seed FILE [--legacy]`
fn cmd_seed(api: &FileApi, file: &Path, legacy: bool, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let store = api.engine().store();
    let report: ImportReport = if legacy {
        let projects = seed::parse_legacy_projects(&text)?;
        seed::import_legacy_projects(store, &projects)?
    } else {
        let doc = SeedDocument::from_json(&text)?;
        seed::import_seed(store, &doc)?
    };

    if json {
        return print_json(&report);
    }
    println!(
        "Hardware sets: {} created, {} skipped",
        report.hwsets_created, report.hwsets_skipped
    );
    println!(
        "Projects:      {} created, {} skipped",
        report.projects_created, report.projects_skipped
    );
    for d in &report.discrepancies {
        println!(
            "  warning: {} lists {} as {}/{}; kept {}/{}",
            d.project,
            d.hwset,
            d.ignored.available,
            d.ignored.capacity,
            d.kept.available,
            d.kept.capacity
        );
    }
    Ok(())
}

/// `labinv register USER`
fn cmd_register(api: &FileApi, user: &str) -> Result<()> {
    let password = read_password()?;
    api.accounts().register(user, &password)?;
    println!("Registered {}", user.trim());
    Ok(())
}

/// `labinv login USER`
fn cmd_login(api: &FileApi, user: &str) -> Result<()> {
    let password = read_password()?;
    let token = api.accounts().login(user, &password)?;
    println!("{token}");
    Ok(())
}

/// `labinv hwsets`
fn cmd_hwsets(api: &FileApi, json: bool) -> Result<()> {
    let hwsets = api.engine().list_hardware_sets()?;
    if json {
        return print_json(&hwsets);
    }
    if hwsets.is_empty() {
        println!("No hardware sets. Run `labinv seed` first.");
        return Ok(());
    }
    println!(
        "{:<20} {:<28} {:>9} {:>9} {:>9}",
        "ID", "NAME", "AVAILABLE", "IN USE", "CAPACITY"
    );
    println!("{}", "-".repeat(79));
    for h in &hwsets {
        print_hwset_row(h);
    }
    Ok(())
}

fn print_hwset_row(h: &HardwareSet) {
    println!(
        "{:<20} {:<28} {:>9} {:>9} {:>9}",
        h.id.as_str(),
        h.name,
        h.available,
        h.in_use(),
        h.capacity
    );
}

/// `labinv projects`
fn cmd_projects(api: &FileApi, json: bool) -> Result<()> {
    let projects = api.engine().list_projects()?;
    if json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    println!("{:<24} {:>7}  HARDWARE SETS", "NAME", "MEMBERS");
    println!("{}", "-".repeat(64));
    for p in &projects {
        let hwsets: Vec<&str> = p.hardware_sets.iter().map(|h| h.id.as_str()).collect();
        println!(
            "{:<24} {:>7}  {}",
            p.name,
            p.authorized_users.len(),
            hwsets.join(", ")
        );
    }
    Ok(())
}

/// `labinv show NAME`
fn cmd_show(api: &FileApi, name: &str, json: bool) -> Result<()> {
    let project = api.engine().get_project(name)?;
    if json {
        return print_json(&project);
    }
    print_project(&project);
    Ok(())
}

fn print_project(p: &ProjectView) {
    println!("Project:     {}", p.name);
    if !p.description.is_empty() {
        println!("Description: {}", p.description);
    }
    println!(
        "Created:     {}",
        lab_inventory::time::micros_to_rfc3339(p.created_at)
    );
    let members: Vec<&str> = p.authorized_users.iter().map(String::as_str).collect();
    println!("Members:     {}", members.join(", "));
    println!("Hardware:");
    for h in &p.hardware_sets {
        print!("  ");
        print_hwset_row(h);
    }
    for id in &p.unresolved {
        println!("  {id} (missing)");
    }
}

/// `labinv create NAME --hwset ID ... --as USER`
fn cmd_create(
    api: &FileApi,
    name: &str,
    hwsets: &[String],
    description: &str,
    acting: &Acting,
    json: bool,
) -> Result<()> {
    let caller = caller(api, acting)?;
    let project = api
        .engine()
        .create_project(name, hwsets, description, &caller)?;
    if json {
        return print_json(&project);
    }
    println!("Created project '{}' for {caller}", project.name);
    Ok(())
}

/// `labinv join|leave NAME --as USER`
fn cmd_membership(api: &FileApi, name: &str, acting: &Acting, join: bool) -> Result<()> {
    let caller = caller(api, acting)?;
    let change = if join {
        api.engine().join(name, &caller)?
    } else {
        api.engine().leave(name, &caller)?
    };
    let message = match (change, join) {
        (MembershipChange::Applied, true) => format!("{caller} joined {name}"),
        (MembershipChange::Applied, false) => format!("{caller} left {name}"),
        (MembershipChange::Unchanged, true) => format!("{caller} is already in {name}"),
        (MembershipChange::Unchanged, false) => format!("{caller} was not in {name}"),
        (MembershipChange::ProjectMissing, _) => format!("no project named {name}"),
    };
    println!("{message}");
    Ok(())
}

/// `labinv checkin|checkout PROJECT HWSET QTY --as USER`
fn cmd_move(
    api: &FileApi,
    project: &str,
    hwset: &str,
    qty: u64,
    acting: &Acting,
    checkin: bool,
    json: bool,
) -> Result<()> {
    let caller = caller(api, acting)?;
    let hwset = HwSetId::parse(hwset)?;
    let allocation = if checkin {
        api.engine().checkin(project, &hwset, qty, &caller)?
    } else {
        api.engine().checkout(project, &hwset, qty, &caller)?
    };
    if json {
        return print_json(&allocation);
    }
    let verb = if checkin { "Checked in" } else { "Checked out" };
    println!(
        "{verb} {qty} x {hwset} for {project}: {}/{} available",
        allocation.available, allocation.capacity
    );
    Ok(())
}

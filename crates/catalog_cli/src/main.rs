//! Catalog bootstrap entry point.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open both stores.
//! - Dispatch one catalog command per invocation and print JSON results.
//!
//! # Invariants
//! - Store handles are owned here and lent to the service for one command.
//! - Process exit code reflects the catalog error kind.

use catalog_core::db::{open_db, DbError};
use catalog_core::{
    init_logging, AuditStoreError, CatalogConfig, CatalogError, CatalogService, ConfigError,
    ErrorKind, ItemId, ItemPayload, JsonlAuditLogStore, LoggingError, RequestContext,
    SqliteItemStore, StoreError,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Manage catalog items with an audited change trail.
#[derive(Parser, Debug)]
#[command(name = "catalog", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML config file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Client address recorded in the audit trail
    #[arg(long, global = true, default_value = "127.0.0.1")]
    client_ip: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List active items, optionally filtered by name prefix
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        offset: Option<String>,
    },
    /// Show one item
    Get { id: ItemId },
    /// Create an item
    Create(PayloadArgs),
    /// Replace the mutable fields of an item
    Update {
        id: ItemId,
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Soft-delete an item
    Delete { id: ItemId },
}

#[derive(Args, Debug)]
struct PayloadArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Image reference (URL or path) of an already uploaded file
    #[arg(long)]
    image: Option<String>,
}

impl From<PayloadArgs> for ItemPayload {
    fn from(args: PayloadArgs) -> Self {
        Self {
            name: args.name,
            category: args.category,
            description: args.description,
            image: args.image,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] LoggingError),
    #[error("cannot resolve working directory: {0}")]
    WorkingDir(#[source] std::io::Error),
    #[error("cannot open item database: {0}")]
    Db(#[from] DbError),
    #[error("cannot open item store: {0}")]
    ItemStore(#[from] StoreError),
    #[error("cannot open audit log: {0}")]
    AuditStore(#[from] AuditStoreError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("cannot render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Catalog(err) => match err.kind() {
                ErrorKind::InvalidParameter | ErrorKind::ValidationFailure => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::EntityStoreFailure => 4,
                ErrorKind::AuditStoreFailure => 5,
            },
            _ => 1,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let config = match cli.config.as_deref() {
        Some(path) => CatalogConfig::load(path)?,
        None => CatalogConfig::default(),
    };

    if let Some(dir) = config.logging.dir.as_deref() {
        init_logging(&config.logging.level, absolute(dir)?)?;
    }

    let conn = open_db(&config.database.path)?;
    let items = SqliteItemStore::try_new(&conn)?.with_deadline(config.database.deadline())?;
    let audit =
        JsonlAuditLogStore::open(&config.audit.log_file)?.with_deadline(config.audit.deadline());
    let service = CatalogService::new(items, audit);
    info!(
        "event=cli_command module=cli status=start command={}",
        command_name(&cli.command)
    );

    let client_ip = cli.client_ip;
    let output = match cli.command {
        Command::List {
            search,
            limit,
            offset,
        } => serde_json::to_string_pretty(&service.list_with_raw_paging(
            &search,
            limit.as_deref(),
            offset.as_deref(),
        )?)?,
        Command::Get { id } => serde_json::to_string_pretty(&service.get(id)?)?,
        Command::Create(args) => {
            let ctx = RequestContext::new(client_ip, "/items");
            serde_json::to_string_pretty(&service.create(&ctx, &args.into())?)?
        }
        Command::Update { id, payload } => {
            let ctx = RequestContext::new(client_ip, format!("/items/{id}"));
            serde_json::to_string_pretty(&service.update(&ctx, id, &payload.into())?)?
        }
        Command::Delete { id } => {
            let ctx = RequestContext::new(client_ip, format!("/items/{id}"));
            service.delete(&ctx, id)?;
            serde_json::to_string_pretty(&serde_json::json!({ "deleted": id }))?
        }
    };

    Ok(output)
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::List { .. } => "list",
        Command::Get { .. } => "get",
        Command::Create(_) => "create",
        Command::Update { .. } => "update",
        Command::Delete { .. } => "delete",
    }
}

fn absolute(dir: &Path) -> Result<PathBuf, CliError> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(CliError::WorkingDir)?;
    Ok(cwd.join(dir))
}

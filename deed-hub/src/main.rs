//! Deed Hub command-line host
//!
//! Opens the journaled registry in the data directory, runs one operation as
//! the given identity and prints the result as JSON on stdout. Rejections are
//! printed as `{"error": <kind>, "message": <text>}` with exit status 1.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use deed_hub_core::storage::PermissionStore;
use deed_hub_core::{Command, DocId, Identity, JournalError, JournaledRegistry};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deed-hub")]
#[command(about = "Permissioned registry of property documents")]
struct Cli {
    /// Registry directory [env: DEED_HUB_DATA_DIR, default: data]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Identity to act as [env: DEED_HUB_CALLER]
    #[arg(long = "as", global = true)]
    caller: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new registry administered by the caller
    Init,

    /// Register a document owned by the caller
    Register {
        #[arg(long)]
        title: String,

        /// File size in bytes
        #[arg(long)]
        size: u64,

        #[arg(long)]
        description: String,

        /// Tag to attach, repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Replace title, size, description and tags
    Update {
        doc_id: u64,

        #[arg(long)]
        title: String,

        #[arg(long)]
        size: u64,

        #[arg(long)]
        description: String,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Hand a document to a new owner
    Transfer { doc_id: u64, new_owner: String },

    /// Append tags to a document
    AddTags { doc_id: u64, tags: Vec<String> },

    Archive { doc_id: u64 },

    Delete { doc_id: u64 },

    /// Let an identity view a document
    Grant { doc_id: u64, viewer: String },

    /// Withdraw an identity's view access
    Revoke { doc_id: u64, viewer: String },

    /// Print a document record and its viewers
    Show { doc_id: u64 },

    /// Check a presumed owner against the record
    Verify { doc_id: u64, owner: String },

    /// Print age, size and tag count of a document
    Stats { doc_id: u64 },

    /// Administrator health summary
    Maintenance,

    /// Request a security lock on a document
    Lock { doc_id: u64 },
}

struct Config {
    data_dir: PathBuf,
    caller: Identity,
}

fn load_config(data_dir: Option<PathBuf>, caller: Option<String>) -> Result<Config> {
    let data_dir = data_dir.unwrap_or_else(|| {
        std::env::var("DEED_HUB_DATA_DIR")
            .unwrap_or_else(|_| "data".to_string())
            .into()
    });
    let caller = caller
        .or_else(|| std::env::var("DEED_HUB_CALLER").ok())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| anyhow!("no caller identity, pass --as or set DEED_HUB_CALLER"))?;

    Ok(Config {
        data_dir,
        caller: Identity::new(caller),
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.data_dir, cli.caller)?;
    debug!("acting as {} on {}", config.caller, config.data_dir.display());

    match run(cli.command, &config).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(JournalError::Rejected(e)) => {
            let body = json!({ "error": e.kind(), "message": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::FAILURE)
        }
        Err(JournalError::Storage(e)) => Err(e),
    }
}

/// Read-side operations; these never touch the log.
enum Query {
    Show(DocId),
    Verify(DocId, Identity),
    Stats(DocId),
    Maintenance,
    Lock(DocId),
}

async fn run(command: Commands, config: &Config) -> Result<Value, JournalError> {
    let caller = &config.caller;

    let mutation = match command {
        Commands::Init => {
            JournaledRegistry::initialize(&config.data_dir, caller.clone()).await?;
            return Ok(json!({
                "administrator": caller.as_str(),
                "data_dir": config.data_dir.display().to_string(),
            }));
        }
        Commands::Register {
            title,
            size,
            description,
            tags,
        } => Command::Register {
            title,
            file_size: size,
            description,
            tags,
        },
        Commands::Update {
            doc_id,
            title,
            size,
            description,
            tags,
        } => Command::Update {
            doc_id: DocId(doc_id),
            title,
            file_size: size,
            description,
            tags,
        },
        Commands::Transfer { doc_id, new_owner } => Command::Transfer {
            doc_id: DocId(doc_id),
            new_owner: Identity::new(new_owner),
        },
        Commands::AddTags { doc_id, tags } => Command::AddTags {
            doc_id: DocId(doc_id),
            tags,
        },
        Commands::Archive { doc_id } => Command::Archive {
            doc_id: DocId(doc_id),
        },
        Commands::Delete { doc_id } => Command::Delete {
            doc_id: DocId(doc_id),
        },
        Commands::Grant { doc_id, viewer } => Command::GrantAccess {
            doc_id: DocId(doc_id),
            viewer: Identity::new(viewer),
        },
        Commands::Revoke { doc_id, viewer } => Command::RevokeAccess {
            doc_id: DocId(doc_id),
            viewer: Identity::new(viewer),
        },
        Commands::Show { doc_id } => return answer(Query::Show(DocId(doc_id)), config).await,
        Commands::Verify { doc_id, owner } => {
            let query = Query::Verify(DocId(doc_id), Identity::new(owner));
            return answer(query, config).await;
        }
        Commands::Stats { doc_id } => return answer(Query::Stats(DocId(doc_id)), config).await,
        Commands::Maintenance => return answer(Query::Maintenance, config).await,
        Commands::Lock { doc_id } => return answer(Query::Lock(DocId(doc_id)), config).await,
    };

    let mut journal = JournaledRegistry::open(&config.data_dir).await?;
    let outcome = journal.submit(caller, mutation).await?;
    to_json(&outcome)
}

async fn answer(query: Query, config: &Config) -> Result<Value, JournalError> {
    let journal = JournaledRegistry::open(&config.data_dir).await?;
    let ctx = journal.context(&config.caller);
    let registry = journal.registry();

    match query {
        Query::Show(doc_id) => {
            let record = registry.get_document(&ctx, doc_id)?;
            Ok(json!({
                "doc_id": doc_id,
                "record": to_json(record)?,
                "viewers": to_json(&registry.permissions().viewers(doc_id))?,
            }))
        }
        Query::Verify(doc_id, owner) => {
            to_json(&registry.verify_authenticity(&ctx, doc_id, &owner)?)
        }
        Query::Stats(doc_id) => to_json(&registry.get_statistics(&ctx, doc_id)?),
        Query::Maintenance => to_json(&registry.system_maintenance_check(&ctx)?),
        Query::Lock(doc_id) => {
            registry.security_lock(&ctx, doc_id)?;
            Ok(json!({ "doc_id": doc_id, "acknowledged": true }))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, JournalError> {
    Ok(serde_json::to_value(value).map_err(anyhow::Error::from)?)
}

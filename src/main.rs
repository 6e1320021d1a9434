//! # Repository indexer CLI (`rix`)
//!
//! Keeps external indexes in sync with a linked-data repository. Each
//! notification names a resource and what happened to it; `rix` fetches
//! whatever representation each backend needs and pushes it to every
//! configured backend.
//!
//! ## Usage
//!
//! ```bash
//! rix --config ./config/indexer.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rix serve` | Start the HTTP notification endpoint |
//! | `rix handle <id>` | Dispatch one notification and wait for every backend |
//! | `rix fetch <id>` | Print one representation of a resource |
//! | `rix backends` | List configured backends |
//! | `rix init` | Create the schema of every SQLite index |
//! | `rix search "<query>"` | Keyword search over a SQLite index |
//!
//! ## Examples
//!
//! ```bash
//! # Re-index one resource by hand
//! rix handle /collection/obj1
//!
//! # Replay a removal
//! rix handle /collection/obj1 --remove
//!
//! # See the named fields Solr would receive
//! rix fetch /collection/obj1 --kind named-fields
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use repo_indexer::backend_sqlite::SqliteBackend;
use repo_indexer::config::{self, Config};
use repo_indexer::dispatcher::BackendStatus;
use repo_indexer::notification::classify;
use repo_indexer::registry::{dispatcher_from_config, registry_from_config};
use repo_indexer::retriever::Repository;
use repo_indexer::{logging, server};
use repo_indexer_core::models::{EventKind, Notification, Representation};
use std::io::Write;
use std::path::PathBuf;

/// Repository indexer: dispatch repository change notifications to search
/// indexes and triple stores.
#[derive(Parser)]
#[command(name = "rix", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/indexer.toml`. See
    /// `config/indexer.example.toml` for every setting.
    #[arg(long, global = true, default_value = "./config/indexer.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP notification endpoint.
    Serve,

    /// Dispatch one notification and wait for every backend to answer.
    Handle {
        /// Resource identifier, relative to `repository.base_url`.
        id: String,

        /// Treat the notification as a removal.
        #[arg(long, conflicts_with = "event")]
        remove: bool,

        /// Event-type code, classified like a broker message would be.
        #[arg(long)]
        event: Option<String>,
    },

    /// Fetch one representation of a resource and write it to stdout.
    Fetch {
        id: String,

        #[arg(long, value_enum, default_value = "rdf")]
        kind: FetchKind,
    },

    /// List configured backends and the content each one needs.
    Backends,

    /// Create the schema of every configured SQLite index.
    ///
    /// Idempotent; `serve` and `handle` also do this on start.
    Init,

    /// Keyword search over a SQLite index backend.
    Search {
        query: String,

        /// Instance name under `[backends.sqlite]`. Optional when only one
        /// is configured.
        #[arg(long)]
        backend: Option<String>,

        #[arg(long, default_value = "10")]
        limit: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FetchKind {
    Rdf,
    NamedFields,
}

impl From<FetchKind> for Representation {
    fn from(kind: FetchKind) -> Self {
        match kind {
            FetchKind::Rdf => Representation::Rdf,
            FetchKind::NamedFields => Representation::NamedFields,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging)?;

    match cli.command {
        Commands::Serve => server::run_server(&cfg).await?,
        Commands::Handle { id, remove, event } => {
            let kind = match (remove, event) {
                (true, _) => EventKind::Remove,
                (false, Some(code)) => classify(&code, &cfg.notifications),
                (false, None) => EventKind::Update,
            };
            handle(&cfg, Notification::new(id, kind)).await?;
        }
        Commands::Fetch { id, kind } => {
            let client = Repository::build_client(&cfg.repository)?;
            let repository = Repository::new(cfg.repository.clone(), client)?;
            let result = repository.retriever(&id, kind.into()).fetch().await?;
            std::io::stdout().write_all(result.content())?;
        }
        Commands::Backends => {
            let registry = registry_from_config(&cfg).await?;
            if registry.is_empty() {
                println!("No backends configured.");
            }
            for backend in registry.backends() {
                println!("{:<32} {}", backend.name(), backend.content_kind());
            }
        }
        Commands::Init => {
            for (name, sqlite) in &cfg.backends.sqlite {
                SqliteBackend::open(format!("sqlite:{}", name), &sqlite.path).await?;
                println!("Initialized sqlite:{} at {}", name, sqlite.path.display());
            }
        }
        Commands::Search {
            query,
            backend,
            limit,
        } => {
            let (name, path) = match backend {
                Some(name) => {
                    let name = name.trim_start_matches("sqlite:").to_string();
                    let sqlite = cfg.backends.sqlite.get(&name).ok_or_else(|| {
                        anyhow::anyhow!("no sqlite backend named '{}' in config", name)
                    })?;
                    (name, sqlite.path.clone())
                }
                None => match cfg.backends.sqlite.len() {
                    1 => {
                        let (name, sqlite) = cfg.backends.sqlite.iter().next().ok_or_else(|| {
                            anyhow::anyhow!("no sqlite backend configured")
                        })?;
                        (name.clone(), sqlite.path.clone())
                    }
                    0 => anyhow::bail!("no sqlite backend configured"),
                    _ => anyhow::bail!("several sqlite backends configured; pass --backend"),
                },
            };
            let index = SqliteBackend::open(format!("sqlite:{}", name), &path).await?;
            let hits = index.search(&query, limit).await?;
            if hits.is_empty() {
                println!("No results.");
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, hit.score, hit.resource_id);
                println!("    {}", hit.snippet.replace('\n', " "));
            }
        }
    }

    Ok(())
}

async fn handle(cfg: &Config, notification: Notification) -> anyhow::Result<()> {
    let dispatcher = dispatcher_from_config(cfg).await?;
    let report = dispatcher.handle(&notification).await.drain().await;

    println!("{} {}", report.event, report.resource);
    for backend in &report.backends {
        let detail = match &backend.status {
            BackendStatus::Succeeded { status } => format!("status {}", status),
            BackendStatus::Failed { reason } | BackendStatus::Skipped { reason } => reason.clone(),
            BackendStatus::Submitted => String::new(),
        };
        println!(
            "  {:<32} {:<10} {}",
            backend.backend,
            backend.status.label(),
            detail
        );
    }

    let failed = report.count(|s| matches!(s, BackendStatus::Failed { .. }));
    if failed > 0 {
        anyhow::bail!("{} backend(s) failed", failed);
    }
    Ok(())
}

//! # omnizient CLI
//!
//! ```bash
//! omnizient --config ./config/omnizient.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `omnizient init` | Create the SQLite database and schema |
//! | `omnizient crawl` | Index new and changed files under the root |
//! | `omnizient sweep` | Remove documents whose files no longer exist |
//! | `omnizient search "<query>"` | Search by name, content, and meaning |
//! | `omnizient get <id>` | Show a document and its entries |
//! | `omnizient extensions` | List the extensions present in the index |
//! | `omnizient stats` | Show index counts |
//! | `omnizient serve` | Start the read-only HTTP mirror |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use omnizient::{commands, config};

/// omnizient: on-device document indexing and search.
#[derive(Parser)]
#[command(name = "omnizient", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/omnizient.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Crawl the configured root and (re)index new or changed files.
    ///
    /// Ctrl-C stops the crawl after the files currently in flight.
    Crawl,

    /// Delete indexed documents whose files no longer exist.
    Sweep,

    /// Search indexed documents.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to files with this extension (repeatable).
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },

    /// Show a document and its index entries.
    Get {
        /// Document id.
        id: String,
    },

    /// List distinct file extensions in the index.
    Extensions,

    /// Show document, entry, and embedding counts.
    Stats,

    /// Start the read-only HTTP mirror on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omnizient=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing files in flight");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Crawl => {
            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());
            commands::run_crawl(&cfg, &token).await?;
        }
        Commands::Sweep => {
            let token = CancellationToken::new();
            cancel_on_ctrl_c(token.clone());
            commands::run_sweep(&cfg, &token).await?;
        }
        Commands::Search { query, extensions } => {
            commands::run_search(&cfg, &query, &extensions).await?
        }
        Commands::Get { id } => commands::run_get(&cfg, &id).await?,
        Commands::Extensions => commands::run_extensions(&cfg).await?,
        Commands::Stats => commands::run_stats(&cfg).await?,
        Commands::Serve => commands::run_serve(&cfg).await?,
    }

    Ok(())
}

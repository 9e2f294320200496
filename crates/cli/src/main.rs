//! Storepulse CLI - migrations, syncs and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! sp-cli migrate
//!
//! # Connect a store (token optional when the direct-access fallback is used)
//! sp-cli store add -t 1 -n "Acme" -d acme.myshopify.com --access-token shpat_...
//!
//! # List connected stores
//! sp-cli store list
//!
//! # Sync one store, or all of them
//! sp-cli sync 3
//! sp-cli sync-all
//!
//! # Remove a store and everything ingested for it
//! sp-cli store delete 3
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `SHOPIFY_*`, `DEV_SHOP_*`, `SYNC_*` - as for the server

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sp-cli")]
#[command(author, version, about = "Storepulse CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Sync one store now
    Sync {
        /// Store ID
        store_id: i32,
    },
    /// Sync every connected store, one after another
    SyncAll,
    /// Manage connected stores
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },
}

#[derive(Subcommand)]
enum StoreAction {
    /// Connect a new store
    Add {
        /// Owning tenant ID
        #[arg(short, long)]
        tenant: i32,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Shop domain (e.g., acme.myshopify.com)
        #[arg(short, long)]
        domain: String,

        /// Admin API access token
        #[arg(long, env = "STORE_ACCESS_TOKEN", hide_env_values = true)]
        access_token: Option<String>,
    },
    /// List connected stores
    List,
    /// Remove a store and all of its ingested data
    Delete {
        /// Store ID
        store_id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Sync { store_id } => commands::sync::one(store_id).await?,
        Commands::SyncAll => commands::sync::all().await?,
        Commands::Store { action } => match action {
            StoreAction::Add {
                tenant,
                name,
                domain,
                access_token,
            } => {
                commands::store::add(tenant, &name, &domain, access_token).await?;
            }
            StoreAction::List => commands::store::list().await?,
            StoreAction::Delete { store_id } => commands::store::delete(store_id).await?,
        },
    }
    Ok(())
}

//! Drape CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! drape-cli migrate
//!
//! # Create an admin (or promote the existing account)
//! drape-cli admin create -n "Asha Rao" -e asha@drape.store -p 'long-password'
//!
//! # Promote an existing customer
//! drape-cli admin promote -i +919876543210
//!
//! # Upsert categories, collections and settings
//! drape-cli seed --file seed.yaml
//! ```
//!
//! All commands read `DRAPE_DATABASE_URL` (or `DATABASE_URL`), loading `.env`
//! when present.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use sqlx::PgPool;

mod commands;

#[derive(Parser)]
#[command(name = "drape-cli")]
#[command(author, version, about = "Drape CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Upsert catalog structure and settings from a YAML file
    Seed {
        /// Path to the seed file
        #[arg(short, long, default_value = "seed.yaml")]
        file: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create an admin account, or promote the account if it exists
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long, required_unless_present = "mobile")]
        email: Option<String>,

        /// Mobile number
        #[arg(short, long)]
        mobile: Option<String>,

        /// Password (min 8 characters)
        #[arg(short, long)]
        password: String,
    },
    /// Promote an existing user to admin
    Promote {
        /// Email or mobile number of the user
        #[arg(short, long)]
        identifier: String,
    },
}

/// Errors resolving the database connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Missing environment variable: DRAPE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the database named by `DRAPE_DATABASE_URL` / `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConnectError` if the variable is unset or the connection fails.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DRAPE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| ConnectError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to database...");
    Ok(drape_api::db::create_pool(&database_url).await?)
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
        Commands::Admin { action } => match action {
            AdminAction::Create {
                name,
                email,
                mobile,
                password,
            } => {
                commands::admin::create(&name, email.as_deref(), mobile.as_deref(), &password)
                    .await?;
            }
            AdminAction::Promote { identifier } => {
                commands::admin::promote(&identifier).await?;
            }
        },
        Commands::Seed { file } => commands::seed::run(&file).await?,
    }
    Ok(())
}

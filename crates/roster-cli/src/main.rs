mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use uuid::Uuid;

use roster_db::Database;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Client roster with per-server access-point quotas")]
#[command(
    after_help = "Environment:\n  ROSTER_DB_PATH      SQLite file (default roster.db)\n  ROSTER_SECRET_KEY   base64 AES-256 key sealing point passwords"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reference data: apps, servers and plans.
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    Clients {
        #[command(subcommand)]
        command: ClientsCommand,
    },
    /// Check a client payload and commit it as `create` or `update`.
    Persist {
        mode: String,
        #[arg(long)]
        client_id: Option<Uuid>,
        payload: PathBuf,
    },
    /// Print a fresh value for ROSTER_SECRET_KEY.
    Keygen,
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Replace the catalog with the contents of a JSON file.
    Import { file: PathBuf },
    Show,
}

#[derive(Subcommand)]
enum ClientsCommand {
    List {
        #[arg(long)]
        query: Option<String>,
    },
    Show {
        id: Uuid,
    },
    Remove {
        id: Uuid,
    },
}

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_cli=info,roster_core=info,roster_db=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Keygen = cli.command {
        return commands::keygen();
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Generate a key with `roster keygen` and set it in your .env file.");
            std::process::exit(1);
        }
    };

    let db = Arc::new(Database::open(&config.db_path, config.key)?);
    info!("Using roster database {}", config.db_path.display());

    commands::run(cli.command, db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn persist_takes_raw_mode_and_optional_id() {
        let cli = Cli::try_parse_from(["roster", "persist", "update", "--client-id",
            "6f1c2a4e-8a53-4c1e-9d2b-1f0a7c3e5b10", "client.json"])
        .unwrap();
        match cli.command {
            Commands::Persist { mode, client_id, payload } => {
                assert_eq!(mode, "update");
                assert!(client_id.is_some());
                assert_eq!(payload, PathBuf::from("client.json"));
            }
            _ => panic!("expected persist"),
        }
        assert!(Cli::try_parse_from(["roster", "clients", "show", "not-a-uuid"]).is_err());
    }
}

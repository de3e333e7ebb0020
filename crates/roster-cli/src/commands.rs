use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use roster_core::{
    CatalogSnapshot, ClientStore, Clock, DraftSession, PersistenceGateway, SystemClock,
};
use roster_db::Database;
use roster_types::{Client, PersistRequest, PersistResponse};

use crate::{CatalogCommand, ClientsCommand, Commands};

pub fn run(command: Commands, db: Arc<Database>) -> Result<()> {
    match command {
        Commands::Catalog { command } => catalog(command, &db),
        Commands::Clients { command } => clients(command, &db),
        Commands::Persist {
            mode,
            client_id,
            payload,
        } => {
            let json = fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let payload: Client = serde_json::from_str(&json).context("parsing client payload")?;
            let client = persist(db, mode, client_id, payload, SystemClock)?;
            let response = PersistResponse {
                success: true,
                client: masked(client),
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Keygen => keygen(),
    }
}

pub fn keygen() -> Result<()> {
    println!("{}", roster_crypto::key_to_base64(&roster_crypto::generate_store_key()));
    Ok(())
}

fn catalog(command: CatalogCommand, db: &Database) -> Result<()> {
    match command {
        CatalogCommand::Import { file } => {
            let json = fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let snapshot = CatalogSnapshot::from_json(&json)?;
            db.replace_catalog(&snapshot)?;
            info!(
                "Imported {} apps, {} servers, {} plans",
                snapshot.apps.len(),
                snapshot.servers.len(),
                snapshot.plans.len()
            );
        }
        CatalogCommand::Show => {
            let snapshot = CatalogSnapshot::load(db)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    Ok(())
}

fn clients(command: ClientsCommand, db: &Database) -> Result<()> {
    match command {
        ClientsCommand::List { query } => {
            let clients = db.list(query.as_deref())?;
            if clients.is_empty() {
                println!("No clients found");
            }
            for client in clients {
                println!(
                    "{}\t{}\t{}\t{} points",
                    client.id.map(|id| id.to_string()).unwrap_or_default(),
                    client.name,
                    client.phone,
                    client.points.len()
                );
            }
        }
        ClientsCommand::Show { id } => {
            let client = db.get(id)?.with_context(|| format!("client {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(&masked(client))?);
        }
        ClientsCommand::Remove { id } => {
            if !db.remove(id)? {
                bail!("client {} not found", id);
            }
            info!("Removed client {}", id);
        }
    }
    Ok(())
}

/// Runs the save gate locally, then hands the payload to the gateway.
fn persist(
    db: Arc<Database>,
    mode: String,
    client_id: Option<uuid::Uuid>,
    payload: Client,
    clock: impl Clock + 'static,
) -> Result<Client> {
    let catalog = CatalogSnapshot::load(db.as_ref())?;
    let draft = DraftSession::from_client(payload, catalog, clock);

    let readiness = draft.readiness();
    if !readiness.ready {
        for error in &readiness.field_errors {
            warn!("{}", error);
        }
        bail!(
            "payload is not ready to save: {}",
            readiness.reason.clone().unwrap_or_default()
        );
    }

    let gateway = PersistenceGateway::new(db.clone(), db);
    let request = PersistRequest {
        mode,
        client_id,
        payload: draft.payload(),
    };
    gateway
        .persist(&request)
        .map_err(|e| anyhow::anyhow!("{} [{:?}]", e, e.kind()))
}

fn masked(mut client: Client) -> Client {
    for point in &mut client.points {
        point.pass = "********".into();
    }
    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use roster_core::FixedClock;
    use roster_crypto::generate_store_key;

    fn demo_db() -> Arc<Database> {
        let db = Database::open_in_memory(generate_store_key()).unwrap();
        let catalog = CatalogSnapshot::from_json(include_str!("../../../demos/catalog.json")).unwrap();
        db.replace_catalog(&catalog).unwrap();
        Arc::new(db)
    }

    fn demo_client() -> Client {
        serde_json::from_str(include_str!("../../../demos/client.json")).unwrap()
    }

    fn today() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    }

    #[test]
    fn demo_client_is_stored_with_a_digits_only_phone() {
        let db = demo_db();
        let client = persist(db.clone(), "create".into(), None, demo_client(), today()).unwrap();
        assert_eq!(client.phone, "11987654321");

        let stored = db.get(client.id.unwrap()).unwrap().unwrap();
        assert_eq!(stored.phone, "11987654321");
        assert_eq!(stored.points.len(), 3);
        assert_eq!(stored.points[0].pass, "change-me");
    }

    #[test]
    fn invalid_exclusive_point_never_reaches_the_database() {
        let db = demo_db();
        let mut payload = demo_client();
        payload.points.remove(0);
        payload.points[0].conns = 2;

        let err = persist(db.clone(), "create".into(), None, payload, today()).unwrap_err();
        assert!(err.to_string().contains("exclusive"), "{err}");
        assert!(db.list(None).unwrap().is_empty());
    }

    #[test]
    fn unknown_mode_is_reported_by_the_gateway() {
        let db = demo_db();
        let err = persist(db.clone(), "upsert".into(), None, demo_client(), today()).unwrap_err();
        assert!(err.to_string().contains("UnknownMode"), "{err}");
        assert!(db.list(None).unwrap().is_empty());
    }
}

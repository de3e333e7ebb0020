use std::collections::HashMap;

use anyhow::{Result, bail};
use roster_core::repository::matches_query;
use roster_core::{CatalogSnapshot, ClientStore, PointRegistry, ReferenceCatalog};
use roster_crypto::{StoreKey, seal_secret};
use roster_types::{App, Client, ClientId, Plan, Point, RegisteredPoint, Server};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::models::{ClientRow, PointRow};

const CLIENT_COLUMNS: &str =
    "id, name, phone, email, plan_id, due_date, screens_per_server, server1_id, server2_id";

const POINT_COLUMNS: &str =
    "client_id, point_id, server_id, app_id, conns, username, pass_ciphertext, pass_nonce";

impl Database {
    // -- Catalog --

    /// Swaps the whole catalog for `catalog` in one transaction.
    pub fn replace_catalog(&self, catalog: &CatalogSnapshot) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute_batch("DELETE FROM apps; DELETE FROM servers; DELETE FROM plans;")?;
            for app in &catalog.apps {
                conn.execute(
                    "INSERT INTO apps (id, name, multi_access) VALUES (?1, ?2, ?3)",
                    rusqlite::params![app.id, app.name, app.multi_access],
                )?;
            }
            for server in &catalog.servers {
                conn.execute(
                    "INSERT INTO servers (id, name) VALUES (?1, ?2)",
                    (&server.id, &server.name),
                )?;
            }
            for plan in &catalog.plans {
                conn.execute(
                    "INSERT INTO plans (id, name, months) VALUES (?1, ?2, ?3)",
                    rusqlite::params![plan.id, plan.name, plan.months],
                )?;
            }
            Ok(())
        })?;
        debug!(
            "Catalog replaced: {} apps, {} servers, {} plans",
            catalog.apps.len(),
            catalog.servers.len(),
            catalog.plans.len()
        );
        Ok(())
    }

    fn load_clients(&self, rows: Vec<ClientRow>, points: Vec<RegisteredPoint>) -> Result<Vec<Client>> {
        let mut by_client: HashMap<ClientId, Vec<Point>> = HashMap::new();
        for registered in points {
            by_client
                .entry(registered.client_id)
                .or_default()
                .push(registered.point);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id.parse::<Uuid>()?;
                row.into_client(by_client.remove(&id).unwrap_or_default())
            })
            .collect()
    }
}

impl ClientStore for Database {
    fn list(&self, query: Option<&str>) -> Result<Vec<Client>> {
        let (rows, points) = self.with_conn(|conn| {
            let rows = query_clients(conn, None)?;
            let points = query_points(conn, self.key(), "", [])?;
            Ok((rows, points))
        })?;
        let clients = self.load_clients(rows, points)?;
        Ok(clients
            .into_iter()
            .filter(|c| query.is_none_or(|q| matches_query(c, q)))
            .collect())
    }

    fn get(&self, id: ClientId) -> Result<Option<Client>> {
        let id = id.to_string();
        let (rows, points) = self.with_conn(|conn| {
            let rows = query_clients(conn, Some(id.as_str()))?;
            let points = query_points(conn, self.key(), "WHERE client_id = ?1", [&id])?;
            Ok((rows, points))
        })?;
        Ok(self.load_clients(rows, points)?.into_iter().next())
    }

    fn create(&self, payload: &Client) -> Result<Client> {
        let id = Uuid::new_v4();
        let client = Client {
            id: Some(id),
            ..payload.clone()
        };
        let id_str = id.to_string();

        self.with_conn_mut(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO clients ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    CLIENT_COLUMNS
                ),
                rusqlite::params![
                    id_str,
                    client.name,
                    client.phone,
                    client.email,
                    client.plan_id,
                    client.due_date.map(|d| d.to_string()),
                    client.screens_per_server,
                    client.server1_id,
                    client.server2_id,
                ],
            )?;
            write_points(conn, self.key(), &id_str, &client.points)
        })?;

        debug!("Created client {} with {} points", id, client.points.len());
        Ok(client)
    }

    fn update(&self, id: ClientId, payload: &Client) -> Result<Client> {
        let client = Client {
            id: Some(id),
            ..payload.clone()
        };
        let id_str = id.to_string();

        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE clients SET name = ?2, phone = ?3, email = ?4, plan_id = ?5, due_date = ?6,
                    screens_per_server = ?7, server1_id = ?8, server2_id = ?9
                 WHERE id = ?1",
                rusqlite::params![
                    id_str,
                    client.name,
                    client.phone,
                    client.email,
                    client.plan_id,
                    client.due_date.map(|d| d.to_string()),
                    client.screens_per_server,
                    client.server1_id,
                    client.server2_id,
                ],
            )?;
            if changed == 0 {
                bail!("Client not found: {}", id);
            }
            write_points(conn, self.key(), &id_str, &client.points)
        })?;

        debug!("Updated client {} with {} points", id, client.points.len());
        Ok(client)
    }

    fn remove(&self, id: ClientId) -> Result<bool> {
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            conn.execute("DELETE FROM points WHERE client_id = ?1", [&id])?;
            let removed = conn.execute("DELETE FROM clients WHERE id = ?1", [&id])?;
            Ok(removed > 0)
        })
    }
}

impl PointRegistry for Database {
    fn points_by_app_and_user(&self, app_id: &str, user: &str) -> Result<Vec<RegisteredPoint>> {
        self.with_conn(|conn| {
            query_points(
                conn,
                self.key(),
                "WHERE app_id = ?1 AND username = ?2",
                [app_id, user],
            )
        })
    }

    fn list_points_for_client(&self, client_id: ClientId) -> Result<Vec<RegisteredPoint>> {
        let id = client_id.to_string();
        self.with_conn(|conn| query_points(conn, self.key(), "WHERE client_id = ?1", [&id]))
    }

    fn replace_points_for_client(&self, client_id: ClientId, points: &[Point]) -> Result<()> {
        let id = client_id.to_string();
        self.with_conn_mut(|conn| write_points(conn, self.key(), &id, points))
    }
}

impl ReferenceCatalog for Database {
    fn list_apps(&self) -> Result<Vec<App>> {
        self.with_conn(|conn| query_apps(conn, None))
    }

    fn list_servers(&self) -> Result<Vec<Server>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM servers ORDER BY rowid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Server {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn list_plans(&self) -> Result<Vec<Plan>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, months FROM plans ORDER BY rowid")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Plan {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        months: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn get_app_by_id(&self, id: &str) -> Result<Option<App>> {
        self.with_conn(|conn| Ok(query_apps(conn, Some(id))?.into_iter().next()))
    }
}

/// Delete-then-reinsert of one client's points, sealing each password.
fn write_points(conn: &Connection, key: &StoreKey, client_id: &str, points: &[Point]) -> Result<()> {
    conn.execute("DELETE FROM points WHERE client_id = ?1", [client_id])?;

    let mut stmt = conn.prepare(&format!(
        "INSERT INTO points (position, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        POINT_COLUMNS
    ))?;
    for (position, point) in points.iter().enumerate() {
        let sealed = seal_secret(key, &point.pass)?;
        stmt.execute(rusqlite::params![
            position as i64,
            client_id,
            point.id,
            point.server_id,
            point.app_id,
            point.conns,
            point.user,
            sealed.ciphertext,
            sealed.nonce,
        ])?;
    }
    Ok(())
}

/// Newest first. Updates keep the rowid, so order reflects creation.
fn query_clients(conn: &Connection, id: Option<&str>) -> Result<Vec<ClientRow>> {
    let sql = format!(
        "SELECT {} FROM clients WHERE ?1 IS NULL OR id = ?1 ORDER BY rowid DESC",
        CLIENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([id], |row| {
            Ok(ClientRow {
                id: row.get(0)?,
                name: row.get(1)?,
                phone: row.get(2)?,
                email: row.get(3)?,
                plan_id: row.get(4)?,
                due_date: row.get(5)?,
                screens_per_server: row.get(6)?,
                server1_id: row.get(7)?,
                server2_id: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_points<P: rusqlite::Params>(
    conn: &Connection,
    key: &StoreKey,
    filter: &str,
    params: P,
) -> Result<Vec<RegisteredPoint>> {
    let sql = format!(
        "SELECT {} FROM points {} ORDER BY client_id, position",
        POINT_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params, |row| {
            Ok(PointRow {
                client_id: row.get(0)?,
                point_id: row.get(1)?,
                server_id: row.get(2)?,
                app_id: row.get(3)?,
                conns: row.get(4)?,
                username: row.get(5)?,
                pass_ciphertext: row.get(6)?,
                pass_nonce: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(|row| row.into_registered(key)).collect()
}

fn query_apps(conn: &Connection, id: Option<&str>) -> Result<Vec<App>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, multi_access FROM apps WHERE ?1 IS NULL OR id = ?1 ORDER BY rowid",
    )?;

    let rows = stmt
        .query_map([id], |row| {
            Ok(App {
                id: row.get(0)?,
                name: row.get(1)?,
                multi_access: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

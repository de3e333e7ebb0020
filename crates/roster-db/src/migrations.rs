use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Roster DB: running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE apps (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                multi_access    INTEGER NOT NULL
            );

            CREATE TABLE servers (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL
            );

            CREATE TABLE plans (
                id      TEXT PRIMARY KEY,
                name    TEXT NOT NULL,
                months  INTEGER NOT NULL CHECK (months >= 0)
            );

            CREATE TABLE clients (
                id                  TEXT PRIMARY KEY,
                name                TEXT NOT NULL,
                phone               TEXT NOT NULL,
                email               TEXT,
                plan_id             TEXT,
                due_date            TEXT,
                screens_per_server  INTEGER NOT NULL,
                server1_id          TEXT,
                server2_id          TEXT,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE points (
                client_id       TEXT NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
                position        INTEGER NOT NULL,
                point_id        INTEGER,
                server_id       TEXT,
                app_id          TEXT,
                conns           INTEGER NOT NULL,
                username        TEXT NOT NULL,
                pass_ciphertext BLOB NOT NULL,
                pass_nonce      BLOB NOT NULL,
                PRIMARY KEY (client_id, position)
            );

            CREATE INDEX idx_points_app_user ON points(app_id, username);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

//! Database row types; these map directly to SQLite rows.
//! Distinct from roster-types models to keep the DB layer independent.

use anyhow::Result;
use chrono::NaiveDate;
use roster_crypto::{StoreKey, open_secret};
use roster_types::{Client, Point, RegisteredPoint};
use uuid::Uuid;

pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub plan_id: Option<String>,
    pub due_date: Option<String>,
    pub screens_per_server: u32,
    pub server1_id: Option<String>,
    pub server2_id: Option<String>,
}

impl ClientRow {
    pub fn into_client(self, points: Vec<Point>) -> Result<Client> {
        let due_date = self
            .due_date
            .as_deref()
            .map(|d| d.parse::<NaiveDate>())
            .transpose()?;
        Ok(Client {
            id: Some(self.id.parse::<Uuid>()?),
            name: self.name,
            phone: self.phone,
            email: self.email,
            plan_id: self.plan_id,
            due_date,
            screens_per_server: self.screens_per_server,
            server1_id: self.server1_id,
            server2_id: self.server2_id,
            points,
        })
    }
}

pub struct PointRow {
    pub client_id: String,
    pub point_id: Option<u32>,
    pub server_id: Option<String>,
    pub app_id: Option<String>,
    pub conns: u32,
    pub username: String,
    pub pass_ciphertext: Vec<u8>,
    pub pass_nonce: Vec<u8>,
}

impl PointRow {
    /// Opens the sealed password with the store key.
    pub fn into_registered(self, key: &StoreKey) -> Result<RegisteredPoint> {
        let pass = open_secret(key, &self.pass_ciphertext, &self.pass_nonce)?;
        Ok(RegisteredPoint {
            client_id: self.client_id.parse::<Uuid>()?,
            point: Point {
                id: self.point_id,
                server_id: self.server_id,
                app_id: self.app_id,
                conns: self.conns,
                user: self.username,
                pass,
            },
        })
    }
}

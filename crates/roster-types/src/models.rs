use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ClientId = Uuid;

/// Client-local point identifier, assigned when the point joins a draft.
pub type PointId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub name: String,
    /// `true` for shared apps; `false` for exclusive apps where an (app, user)
    /// binding may exist only once across all clients.
    #[serde(rename = "multiplosAcessos", alias = "multiAccess")]
    pub multi_access: bool,
}

impl App {
    pub fn is_exclusive(&self) -> bool {
        !self.multi_access
    }
}

/// A capacity bucket. Its ceiling comes from the client, not the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub months: u32,
}

/// One (server, app) credential binding owned by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Point {
    pub id: Option<PointId>,
    pub server_id: Option<String>,
    pub app_id: Option<String>,
    pub conns: u32,
    pub user: String,
    pub pass: String,
}

impl Default for Point {
    fn default() -> Self {
        Self {
            id: None,
            server_id: None,
            app_id: None,
            conns: 1,
            user: String::new(),
            pass: String::new(),
        }
    }
}

impl Point {
    pub fn new(server_id: &str, app_id: &str, conns: u32, user: &str, pass: &str) -> Self {
        Self {
            id: None,
            server_id: Some(server_id.to_string()),
            app_id: Some(app_id.to_string()),
            conns,
            user: user.to_string(),
            pass: pass.to_string(),
        }
    }

    pub fn is_bound_to(&self, server_id: &str) -> bool {
        self.server_id.as_deref() == Some(server_id)
    }
}

/// The billed entity. Also the payload handed to the persistence gateway,
/// in which case `id` is ignored in favour of the request's client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Client {
    pub id: Option<ClientId>,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub plan_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub screens_per_server: u32,
    pub server1_id: Option<String>,
    pub server2_id: Option<String>,
    pub points: Vec<Point>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            phone: String::new(),
            email: None,
            plan_id: None,
            due_date: None,
            screens_per_server: 1,
            server1_id: None,
            server2_id: None,
            points: Vec::new(),
        }
    }
}

impl Client {
    /// Servers assigned to this client, slot 1 first.
    pub fn assigned_servers(&self) -> impl Iterator<Item = &str> {
        self.server1_id
            .as_deref()
            .into_iter()
            .chain(self.server2_id.as_deref())
    }

    pub fn is_assigned(&self, server_id: &str) -> bool {
        self.assigned_servers().any(|s| s == server_id)
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.iter().find(|p| p.id == Some(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerSlot {
    First,
    Second,
}

/// A committed point as held by the global registry, tagged with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredPoint {
    pub client_id: ClientId,
    #[serde(flatten)]
    pub point: Point,
}

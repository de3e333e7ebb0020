use anyhow::Result;
use roster_types::{Client, ClientId, Point, RegisteredPoint};

/// Committed client records.
///
/// `create` and `update` write the client together with its points: the
/// points land in the global registry tagged with the owning client id, and
/// an update replaces that client's whole point set. Both writes happen as a
/// unit or not at all.
pub trait ClientStore {
    /// Newest first. `query` filters case-insensitively on name and phone.
    fn list(&self, query: Option<&str>) -> Result<Vec<Client>>;
    fn get(&self, id: ClientId) -> Result<Option<Client>>;
    /// Assigns a fresh identity; any id carried by `payload` is ignored.
    fn create(&self, payload: &Client) -> Result<Client>;
    fn update(&self, id: ClientId, payload: &Client) -> Result<Client>;
    /// Also drops the client's registry points. Returns whether a record existed.
    fn remove(&self, id: ClientId) -> Result<bool>;
}

/// Cross-client index of committed points, keyed by (app, user).
pub trait PointRegistry {
    fn points_by_app_and_user(&self, app_id: &str, user: &str) -> Result<Vec<RegisteredPoint>>;

    fn find_by_app_and_user(&self, app_id: &str, user: &str) -> Result<Option<RegisteredPoint>> {
        Ok(self.points_by_app_and_user(app_id, user)?.into_iter().next())
    }

    fn list_points_for_client(&self, client_id: ClientId) -> Result<Vec<RegisteredPoint>>;

    /// Delete-then-reinsert; no merge with what was there.
    fn replace_points_for_client(&self, client_id: ClientId, points: &[Point]) -> Result<()>;
}

/// Substring match used by `ClientStore::list`.
pub fn matches_query(client: &Client, query: &str) -> bool {
    let needle = query.to_lowercase();
    client.name.to_lowercase().contains(&needle) || client.phone.to_lowercase().contains(&needle)
}

use std::sync::Mutex;

use anyhow::{Result, anyhow, bail};
use roster_types::{Client, ClientId, Point, RegisteredPoint};
use uuid::Uuid;

use crate::repository::{ClientStore, PointRegistry, matches_query};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tables {
    /// Newest first.
    clients: Vec<Client>,
    points: Vec<RegisteredPoint>,
}

/// Single-process store; last write wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_tables<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Tables) -> Result<T>,
    {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| anyhow!("Store lock poisoned: {}", e))?;
        f(&mut tables)
    }

    /// Full copy of both tables, for comparing store state across calls.
    pub fn snapshot(&self) -> Result<(Vec<Client>, Vec<RegisteredPoint>)> {
        self.with_tables(|t| Ok((t.clients.clone(), t.points.clone())))
    }
}

fn register(tables: &mut Tables, client_id: ClientId, points: &[Point]) {
    tables.points.retain(|p| p.client_id != client_id);
    tables
        .points
        .extend(points.iter().cloned().map(|point| RegisteredPoint { client_id, point }));
}

impl ClientStore for MemoryStore {
    fn list(&self, query: Option<&str>) -> Result<Vec<Client>> {
        self.with_tables(|t| {
            Ok(t
                .clients
                .iter()
                .filter(|c| query.is_none_or(|q| matches_query(c, q)))
                .cloned()
                .collect())
        })
    }

    fn get(&self, id: ClientId) -> Result<Option<Client>> {
        self.with_tables(|t| Ok(t.clients.iter().find(|c| c.id == Some(id)).cloned()))
    }

    fn create(&self, payload: &Client) -> Result<Client> {
        self.with_tables(|t| {
            let id = Uuid::new_v4();
            let client = Client {
                id: Some(id),
                ..payload.clone()
            };
            register(t, id, &client.points);
            t.clients.insert(0, client.clone());
            Ok(client)
        })
    }

    fn update(&self, id: ClientId, payload: &Client) -> Result<Client> {
        self.with_tables(|t| {
            let Some(idx) = t.clients.iter().position(|c| c.id == Some(id)) else {
                bail!("Client not found: {}", id);
            };
            let client = Client {
                id: Some(id),
                ..payload.clone()
            };
            register(t, id, &client.points);
            t.clients[idx] = client.clone();
            Ok(client)
        })
    }

    fn remove(&self, id: ClientId) -> Result<bool> {
        self.with_tables(|t| {
            let before = t.clients.len();
            t.clients.retain(|c| c.id != Some(id));
            t.points.retain(|p| p.client_id != id);
            Ok(t.clients.len() != before)
        })
    }
}

impl PointRegistry for MemoryStore {
    fn points_by_app_and_user(&self, app_id: &str, user: &str) -> Result<Vec<RegisteredPoint>> {
        self.with_tables(|t| {
            Ok(t.points
                .iter()
                .filter(|p| p.point.app_id.as_deref() == Some(app_id) && p.point.user == user)
                .cloned()
                .collect())
        })
    }

    fn list_points_for_client(&self, client_id: ClientId) -> Result<Vec<RegisteredPoint>> {
        self.with_tables(|t| {
            Ok(t.points
                .iter()
                .filter(|p| p.client_id == client_id)
                .cloned()
                .collect())
        })
    }

    fn replace_points_for_client(&self, client_id: ClientId, points: &[Point]) -> Result<()> {
        self.with_tables(|t| {
            register(t, client_id, points);
            if let Some(client) = t.clients.iter_mut().find(|c| c.id == Some(client_id)) {
                client.points = points.to_vec();
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(name: &str, points: Vec<Point>) -> Client {
        Client {
            name: name.into(),
            phone: "11".into(),
            points,
            ..Client::default()
        }
    }

    #[test]
    fn create_assigns_identity_and_prepends() {
        let store = MemoryStore::new();
        let a = store.create(&client("Ana", vec![])).unwrap();
        let b = store.create(&client("Bia", vec![])).unwrap();
        assert!(a.id.is_some());
        assert_ne!(a.id, b.id);
        let names: Vec<_> = store.list(None).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Bia", "Ana"]);
        assert_eq!(store.list(Some("an")).unwrap().len(), 1);
    }

    #[test]
    fn update_replaces_registry_points() {
        let store = MemoryStore::new();
        let a = store
            .create(&client("Ana", vec![Point::new("s1", "app2", 1, "bob", "pw")]))
            .unwrap();
        let id = a.id.unwrap();
        assert!(store.find_by_app_and_user("app2", "bob").unwrap().is_some());

        store
            .update(id, &client("Ana", vec![Point::new("s1", "app2", 1, "carl", "pw")]))
            .unwrap();
        assert!(store.find_by_app_and_user("app2", "bob").unwrap().is_none());
        let points = store.list_points_for_client(id).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].point.user, "carl");
    }

    #[test]
    fn update_of_missing_client_fails() {
        let store = MemoryStore::new();
        assert!(store.update(Uuid::new_v4(), &client("Ana", vec![])).is_err());
    }

    #[test]
    fn remove_drops_points_too() {
        let store = MemoryStore::new();
        let a = store
            .create(&client("Ana", vec![Point::new("s1", "app1", 1, "ana", "pw")]))
            .unwrap();
        let id = a.id.unwrap();
        assert!(store.remove(id).unwrap());
        assert!(!store.remove(id).unwrap());
        assert!(store.list_points_for_client(id).unwrap().is_empty());
        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn replace_points_keeps_record_and_registry_in_step() {
        let store = MemoryStore::new();
        let id = store.create(&client("Ana", vec![])).unwrap().id.unwrap();
        store
            .replace_points_for_client(id, &[Point::new("s1", "app1", 2, "ana", "pw")])
            .unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().points.len(), 1);
        assert_eq!(store.list_points_for_client(id).unwrap().len(), 1);
    }
}

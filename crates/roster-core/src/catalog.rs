use anyhow::Result;
use roster_types::{App, Plan, Server};
use serde::{Deserialize, Serialize};

/// Read-only lookups over apps, servers and plans.
///
/// Implementations may hit storage, so every lookup is fallible; a failure is
/// a fatal load error for whoever asked.
pub trait ReferenceCatalog {
    fn list_apps(&self) -> Result<Vec<App>>;
    fn list_servers(&self) -> Result<Vec<Server>>;
    fn list_plans(&self) -> Result<Vec<Plan>>;

    fn get_app_by_id(&self, id: &str) -> Result<Option<App>> {
        Ok(self.list_apps()?.into_iter().find(|a| a.id == id))
    }

    fn get_plan_by_id(&self, id: &str) -> Result<Option<Plan>> {
        Ok(self.list_plans()?.into_iter().find(|p| p.id == id))
    }
}

/// Immutable copy of the catalog, taken once per editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSnapshot {
    pub apps: Vec<App>,
    pub servers: Vec<Server>,
    pub plans: Vec<Plan>,
}

impl CatalogSnapshot {
    pub fn load<C: ReferenceCatalog + ?Sized>(catalog: &C) -> Result<Self> {
        Ok(Self {
            apps: catalog.list_apps()?,
            servers: catalog.list_servers()?,
            plans: catalog.list_plans()?,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn app(&self, id: &str) -> Option<&App> {
        self.apps.iter().find(|a| a.id == id)
    }

    pub fn server(&self, id: &str) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == id)
    }

    pub fn plan(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }
}

impl ReferenceCatalog for CatalogSnapshot {
    fn list_apps(&self) -> Result<Vec<App>> {
        Ok(self.apps.clone())
    }

    fn list_servers(&self) -> Result<Vec<Server>> {
        Ok(self.servers.clone())
    }

    fn list_plans(&self) -> Result<Vec<Plan>> {
        Ok(self.plans.clone())
    }

    fn get_app_by_id(&self, id: &str) -> Result<Option<App>> {
        Ok(self.app(id).cloned())
    }

    fn get_plan_by_id(&self, id: &str) -> Result<Option<Plan>> {
        Ok(self.plan(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "apps": [
            {"id": "app1", "name": "Shared", "multiplosAcessos": true},
            {"id": "app2", "name": "Exclusive", "multiplosAcessos": false}
        ],
        "servers": [{"id": "s1", "name": "Alpha"}],
        "plans": [{"id": "p3", "name": "Quarterly", "months": 3}]
    }"#;

    #[test]
    fn snapshot_parses_and_resolves() {
        let catalog = CatalogSnapshot::from_json(CATALOG).unwrap();
        assert!(catalog.app("app2").unwrap().is_exclusive());
        assert_eq!(catalog.get_plan_by_id("p3").unwrap().unwrap().months, 3);
        assert!(catalog.get_app_by_id("nope").unwrap().is_none());
        assert_eq!(catalog.server("s1").unwrap().name, "Alpha");
    }

    #[test]
    fn load_copies_every_list() {
        let source = CatalogSnapshot::from_json(CATALOG).unwrap();
        let copy = CatalogSnapshot::load(&source).unwrap();
        assert_eq!(copy, source);
    }
}

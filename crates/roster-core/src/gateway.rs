use std::str::FromStr;
use std::sync::Arc;

use roster_types::{Client, ClientId, PersistRequest, Point};
use tracing::{debug, info, warn};

use crate::catalog::ReferenceCatalog;
use crate::error::PersistError;
use crate::repository::{ClientStore, PointRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    Create,
    Update,
}

impl FromStr for PersistMode {
    type Err = PersistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            other => Err(PersistError::UnknownMode(other.to_string())),
        }
    }
}

/// Check-then-commit front door to the stores.
///
/// Every point of the payload is checked against the catalog and the global
/// registry before the first write is issued, so a rejected payload leaves
/// the stores exactly as they were. Correct only with a single writer.
pub struct PersistenceGateway<C, S> {
    catalog: Arc<C>,
    store: Arc<S>,
}

impl<C, S> Clone for PersistenceGateway<C, S> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            store: Arc::clone(&self.store),
        }
    }
}

impl<C, S> PersistenceGateway<C, S>
where
    C: ReferenceCatalog,
    S: ClientStore + PointRegistry,
{
    pub fn new(catalog: Arc<C>, store: Arc<S>) -> Self {
        Self { catalog, store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn persist(&self, request: &PersistRequest) -> Result<Client, PersistError> {
        let mode: PersistMode = request.mode.parse()?;
        let owner = match mode {
            PersistMode::Create => None,
            PersistMode::Update => {
                let id = request.client_id.ok_or(PersistError::MissingClientId)?;
                if self.store.get(id)?.is_none() {
                    return Err(PersistError::ClientNotFound(id));
                }
                Some(id)
            }
        };

        if let Err(e) = self.check(&request.payload, owner) {
            warn!("Persist rejected ({:?}): {}", mode, e);
            return Err(e);
        }

        let client = match owner {
            None => self.store.create(&request.payload)?,
            Some(id) => self.store.update(id, &request.payload)?,
        };
        info!(
            "Persisted client {} ({:?}, {} points)",
            client.id.map(|id| id.to_string()).unwrap_or_default(),
            mode,
            client.points.len()
        );
        Ok(client)
    }

    /// Phase one resolves every app; phase two checks exclusive bindings
    /// against the registry. A client may re-claim its own bindings on update.
    fn check(&self, payload: &Client, owner: Option<ClientId>) -> Result<(), PersistError> {
        let mut exclusive: Vec<(&str, &Point)> = Vec::new();
        for point in &payload.points {
            let app_id = point.app_id.as_deref().unwrap_or_default();
            let app = self
                .catalog
                .get_app_by_id(app_id)?
                .ok_or_else(|| PersistError::ReferenceNotFound {
                    app_id: app_id.to_string(),
                })?;
            if app.is_exclusive() {
                exclusive.push((app_id, point));
            }
        }

        for (app_id, point) in exclusive {
            let holders = self.store.points_by_app_and_user(app_id, &point.user)?;
            if let Some(holder) = holders.iter().find(|h| Some(h.client_id) != owner) {
                debug!(
                    "Exclusive binding {}/{} held by client {}",
                    app_id, point.user, holder.client_id
                );
                return Err(PersistError::GlobalConflict {
                    user: point.user.clone(),
                    app_id: app_id.to_string(),
                });
            }
        }
        Ok(())
    }
}

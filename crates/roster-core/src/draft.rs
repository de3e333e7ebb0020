//! The in-progress client being edited.
//!
//! A [`DraftSession`] owns one draft plus the catalog snapshot it was opened
//! with. Every mutation re-runs the local checks so callers can gate the save
//! button on [`DraftSession::readiness`]. Committing consumes the session;
//! editing a committed client again means loading it back into a fresh one.

use std::collections::HashSet;

use chrono::{Months, NaiveDate};
use roster_types::{Client, PersistRequest, Point, PointId, ServerSlot};
use thiserror::Error;

use crate::catalog::{CatalogSnapshot, ReferenceCatalog};
use crate::clock::Clock;
use crate::error::{Field, PersistError, ValidationError};
use crate::gateway::PersistenceGateway;
use crate::repository::{ClientStore, PointRegistry};
use crate::validation::{
    self, check_local_unique_app_user, check_points_local, check_quota_exact,
    check_servers_distinct, validate_client_fields, validate_point_local, validate_screens,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftState {
    Empty,
    Editing,
    ReadyToSave,
    Rejected { reason: String },
}

/// Save gate. `reason` is the first failure in form order; `field_errors`
/// holds every independent field failure for inline display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub reason: Option<String>,
    pub field_errors: Vec<ValidationError>,
}

impl Readiness {
    /// Every point is re-checked on its own, so a record loaded wholesale is
    /// held to the same rules as one built point by point.
    pub fn evaluate(client: &Client, catalog: &CatalogSnapshot, today: NaiveDate) -> Self {
        let field_errors = validate_client_fields(client, today);
        let first = field_errors
            .first()
            .cloned()
            .map(Err)
            .unwrap_or(Ok(()))
            .and_then(|()| check_servers_distinct(client))
            .and_then(|()| check_points_local(&client.points, &catalog.apps, client.screens_per_server))
            .and_then(|()| check_quota_exact(client))
            .and_then(|()| check_local_unique_app_user(&client.points));

        match first {
            Ok(()) => Self {
                ready: true,
                reason: None,
                field_errors,
            },
            Err(e) => Self {
                ready: false,
                reason: Some(e.to_string()),
                field_errors,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("draft is not ready to save: {0}")]
    NotReady(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// A failed commit hands the session back, now in `Rejected` state.
#[derive(Debug)]
pub struct Rejected {
    pub draft: DraftSession,
    pub error: CommitError,
}

pub struct DraftSession {
    client: Client,
    catalog: CatalogSnapshot,
    clock: Box<dyn Clock>,
    next_point_id: PointId,
    state: DraftState,
    readiness: Readiness,
}

impl std::fmt::Debug for DraftSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftSession")
            .field("client", &self.client.id)
            .field("state", &self.state)
            .field("points", &self.client.points.len())
            .finish()
    }
}

impl DraftSession {
    pub fn new(catalog: CatalogSnapshot, clock: impl Clock + 'static) -> Self {
        let client = Client::default();
        let readiness = Readiness::evaluate(&client, &catalog, clock.today());
        Self {
            client,
            catalog,
            clock: Box::new(clock),
            next_point_id: 1,
            state: DraftState::Empty,
            readiness,
        }
    }

    /// Opens a session on a previously committed record. The phone is cut
    /// down to digits and points without a client-local id get one.
    pub fn from_client(mut client: Client, catalog: CatalogSnapshot, clock: impl Clock + 'static) -> Self {
        let mut session = Self::new(catalog, clock);
        client.phone = validation::normalize_phone(&client.phone);
        if let Some(max) = client.points.iter().filter_map(|p| p.id).max() {
            session.bump_past(max);
        }
        session.client = client;
        for idx in 0..session.client.points.len() {
            if session.client.points[idx].id.is_none() {
                let id = session.allocate_point_id();
                session.client.points[idx].id = Some(id);
            }
        }
        session.touch();
        session
    }

    /// Opens a session with a snapshot loaded from any catalog provider.
    pub fn open<C: ReferenceCatalog + ?Sized>(catalog: &C, clock: impl Clock + 'static) -> anyhow::Result<Self> {
        Ok(Self::new(CatalogSnapshot::load(catalog)?, clock))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn catalog(&self) -> &CatalogSnapshot {
        &self.catalog
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    fn touch(&mut self) {
        self.readiness = self.compute_save_readiness();
        self.state = if self.readiness.ready {
            DraftState::ReadyToSave
        } else {
            DraftState::Editing
        };
    }

    pub fn compute_save_readiness(&self) -> Readiness {
        Readiness::evaluate(&self.client, &self.catalog, self.clock.today())
    }

    // -- Fields --

    pub fn set_name(&mut self, name: &str) {
        self.client.name = name.to_string();
        self.touch();
    }

    /// Stores the digits only and returns them.
    pub fn set_phone(&mut self, raw: &str) -> Result<String, ValidationError> {
        let result = validation::validate_phone_raw(raw);
        self.client.phone = validation::normalize_phone(raw);
        self.touch();
        result
    }

    pub fn set_email(&mut self, email: Option<&str>) -> Result<(), ValidationError> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let result = validation::validate_email(email);
        self.client.email = email.map(str::to_string);
        self.touch();
        result
    }

    /// An invalid count is kept as 0 so the save gate reports it.
    pub fn set_screens(&mut self, n: f64) -> Result<u32, ValidationError> {
        let result = validate_screens(n);
        self.client.screens_per_server = *result.as_ref().unwrap_or(&0);
        self.touch();
        result
    }

    pub fn set_due_date(&mut self, due: Option<NaiveDate>) -> Result<(), ValidationError> {
        self.client.due_date = due;
        self.touch();
        validation::validate_due_date(due, self.clock.today()).map(|_| ())
    }

    /// Selects a plan and derives the due date from it.
    pub fn select_plan(&mut self, plan_id: Option<&str>) -> Result<Option<NaiveDate>, ValidationError> {
        if let Some(id) = plan_id {
            if self.catalog.plan(id).is_none() {
                return Err(ValidationError::missing(Field::Plan));
            }
        }
        self.client.plan_id = plan_id.map(str::to_string);
        let due = self.derive_due_date_from_plan();
        self.touch();
        Ok(due)
    }

    /// Sets the due date to today plus the plan's months. A day-of-month the
    /// target month lacks is clamped to that month's last day.
    pub fn derive_due_date_from_plan(&mut self) -> Option<NaiveDate> {
        let plan = self.catalog.plan(self.client.plan_id.as_deref()?)?;
        let due = self
            .clock
            .today()
            .checked_add_months(Months::new(plan.months))?;
        self.client.due_date = Some(due);
        self.touch();
        Some(due)
    }

    /// Setting slot one to the server held by slot two clears slot two. The
    /// reverse is not enforced here; the save gate still rejects equal slots.
    pub fn assign_server(&mut self, slot: ServerSlot, server_id: Option<&str>) -> Result<(), ValidationError> {
        let field = match slot {
            ServerSlot::First => Field::Server1,
            ServerSlot::Second => Field::Server2,
        };
        if let Some(id) = server_id {
            if self.catalog.server(id).is_none() {
                return Err(ValidationError::missing(field));
            }
        }
        let server_id = server_id.map(str::to_string);
        match slot {
            ServerSlot::First => {
                if server_id.is_some() && server_id == self.client.server2_id {
                    self.client.server2_id = None;
                }
                self.client.server1_id = server_id;
            }
            ServerSlot::Second => self.client.server2_id = server_id,
        }
        self.touch();
        Ok(())
    }

    // -- Points --

    /// Inserts a new point or replaces the one with the same id. A rejected
    /// point leaves the draft untouched.
    pub fn add_or_update_point(&mut self, point: Point) -> Result<PointId, ValidationError> {
        let app = point.app_id.as_deref().and_then(|id| self.catalog.app(id));
        let existing_for_server: Vec<Point> = self
            .client
            .points
            .iter()
            .filter(|p| p.id.is_none() || p.id != point.id)
            .filter(|p| p.server_id.is_some() && p.server_id == point.server_id)
            .cloned()
            .collect();
        validate_point_local(
            &point,
            app,
            self.client.screens_per_server,
            &existing_for_server,
        )?;

        if let Some(server_id) = point.server_id.as_deref() {
            if !self.client.is_assigned(server_id) {
                return Err(ValidationError::UnassignedServer {
                    server_id: server_id.to_string(),
                });
            }
        }

        if app.is_some_and(|a| a.is_exclusive()) {
            let taken = self.client.points.iter().any(|p| {
                (p.id.is_none() || p.id != point.id) && p.app_id == point.app_id && p.user == point.user
            });
            if taken {
                return Err(ValidationError::DuplicateKey {
                    app_id: point.app_id.clone().unwrap_or_default(),
                    user: point.user.clone(),
                });
            }
        }

        let id = match point.id {
            Some(id) => id,
            None => self.allocate_point_id(),
        };
        self.bump_past(id);
        let point = Point { id: Some(id), ..point };

        match self.client.points.iter().position(|p| p.id == Some(id)) {
            Some(idx) => self.client.points[idx] = point,
            None => self.client.points.push(point),
        }
        self.touch();
        Ok(id)
    }

    /// Hands out the next unused point id. Once the counter is stuck at
    /// `PointId::MAX`, the lowest free id is reused.
    fn allocate_point_id(&mut self) -> PointId {
        let taken: HashSet<PointId> = self.client.points.iter().filter_map(|p| p.id).collect();
        let id = std::iter::successors(Some(self.next_point_id), |id| id.checked_add(1))
            .chain(1..self.next_point_id)
            .find(|id| !taken.contains(id))
            .unwrap_or(self.next_point_id);
        self.bump_past(id);
        id
    }

    fn bump_past(&mut self, id: PointId) {
        self.next_point_id = self.next_point_id.max(id.saturating_add(1));
    }

    /// Removes without re-checking the remaining points.
    pub fn remove_point(&mut self, id: PointId) -> bool {
        let before = self.client.points.len();
        self.client.points.retain(|p| p.id != Some(id));
        let removed = self.client.points.len() != before;
        self.touch();
        removed
    }

    // -- Commit --

    /// The client as it will be handed to the gateway.
    pub fn payload(&self) -> Client {
        Client {
            name: self.client.name.trim().to_string(),
            phone: validation::normalize_phone(&self.client.phone),
            ..self.client.clone()
        }
    }

    pub fn commit<C, S>(mut self, gateway: &PersistenceGateway<C, S>) -> Result<Client, Box<Rejected>>
    where
        C: ReferenceCatalog,
        S: ClientStore + PointRegistry,
    {
        let readiness = self.compute_save_readiness();
        if !readiness.ready {
            let reason = readiness.reason.clone().unwrap_or_default();
            self.readiness = readiness;
            return Err(self.reject(CommitError::NotReady(reason)));
        }

        let payload = self.payload();
        let request = match self.client.id {
            Some(id) => PersistRequest::update(id, payload),
            None => PersistRequest::create(payload),
        };
        gateway
            .persist(&request)
            .map_err(|e| self.reject(CommitError::Persist(e)))
    }

    fn reject(mut self, error: CommitError) -> Box<Rejected> {
        self.state = DraftState::Rejected {
            reason: error.to_string(),
        };
        Box::new(Rejected { draft: self, error })
    }
}

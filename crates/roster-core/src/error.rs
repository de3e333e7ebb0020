use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy shared by field validation and the persistence gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    EmptyField,
    InvalidFormat,
    OutOfRange,
    ExclusivityViolation,
    QuotaExceeded,
    DuplicateKey,
    MissingReference,
    ReferenceNotFound,
    GlobalConflict,
    UnknownMode,
    MissingClientId,
    ClientNotFound,
    Store,
}

/// Fields named in validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Phone,
    Email,
    Screens,
    DueDate,
    Plan,
    Server1,
    Server2,
    PointServer,
    PointApp,
    PointUser,
    PointPass,
    PointConns,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Screens => "screens per server",
            Self::DueDate => "due date",
            Self::Plan => "plan",
            Self::Server1 => "server 1",
            Self::Server2 => "server 2",
            Self::PointServer => "point server",
            Self::PointApp => "point app",
            Self::PointUser => "point user",
            Self::PointPass => "point password",
            Self::PointConns => "point connections",
        };
        f.write_str(name)
    }
}

/// Local, pre-commit validation failure. The `Display` output is the reason
/// shown next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    EmptyField { field: Field },

    #[error("{field} is malformed")]
    InvalidFormat { field: Field },

    #[error("{field} {constraint}")]
    OutOfRange { field: Field, constraint: &'static str },

    #[error("app {app_id} is exclusive: connections must be 1, got {conns}")]
    ExclusivityViolation { app_id: String, conns: u32 },

    #[error("server {server_id} quota exceeded: {requested} of {quota} screens")]
    QuotaExceeded {
        server_id: String,
        requested: u32,
        quota: u32,
    },

    #[error("server {server_id} is under-filled: {used} of {quota} screens assigned")]
    QuotaNotFilled {
        server_id: String,
        used: u32,
        quota: u32,
    },

    #[error("user {user} is used twice for app {app_id}")]
    DuplicateKey { app_id: String, user: String },

    #[error("server 1 and server 2 must differ (both are {server_id})")]
    ServersNotDistinct { server_id: String },

    #[error("{field} does not resolve")]
    MissingReference { field: Field },

    #[error("point is bound to server {server_id}, which is not assigned to this client")]
    UnassignedServer { server_id: String },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyField { .. } => ErrorKind::EmptyField,
            Self::InvalidFormat { .. } => ErrorKind::InvalidFormat,
            Self::OutOfRange { .. } | Self::QuotaNotFilled { .. } => ErrorKind::OutOfRange,
            Self::ExclusivityViolation { .. } => ErrorKind::ExclusivityViolation,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::DuplicateKey { .. } | Self::ServersNotDistinct { .. } => ErrorKind::DuplicateKey,
            Self::MissingReference { .. } | Self::UnassignedServer { .. } => {
                ErrorKind::MissingReference
            }
        }
    }

    pub(crate) fn empty(field: Field) -> Self {
        Self::EmptyField { field }
    }

    pub(crate) fn missing(field: Field) -> Self {
        Self::MissingReference { field }
    }
}

/// Commit-time failure raised by the persistence gateway. Any of these means
/// nothing was written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("app {app_id} does not exist in the catalog")]
    ReferenceNotFound { app_id: String },

    #[error("user {user} is already bound to exclusive app {app_id} by another client")]
    GlobalConflict { user: String, app_id: String },

    #[error("unknown persist mode '{0}', expected 'create' or 'update'")]
    UnknownMode(String),

    #[error("update requires a client id")]
    MissingClientId,

    #[error("client {0} not found")]
    ClientNotFound(Uuid),

    #[error("store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl PersistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ReferenceNotFound { .. } => ErrorKind::ReferenceNotFound,
            Self::GlobalConflict { .. } => ErrorKind::GlobalConflict,
            Self::UnknownMode(_) => ErrorKind::UnknownMode,
            Self::MissingClientId => ErrorKind::MissingClientId,
            Self::ClientNotFound(_) => ErrorKind::ClientNotFound,
            Self::Store(_) => ErrorKind::Store,
        }
    }
}

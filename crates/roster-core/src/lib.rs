pub mod catalog;
pub mod clock;
pub mod draft;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod repository;
pub mod validation;

pub use catalog::{CatalogSnapshot, ReferenceCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use draft::{CommitError, DraftSession, DraftState, Readiness, Rejected};
pub use error::{ErrorKind, Field, PersistError, ValidationError};
pub use gateway::{PersistMode, PersistenceGateway};
pub use memory::MemoryStore;
pub use repository::{ClientStore, PointRegistry};

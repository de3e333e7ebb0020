pub mod api;
pub mod models;

pub use api::{PersistRequest, PersistResponse};
pub use models::{App, Client, ClientId, Plan, Point, PointId, RegisteredPoint, Server, ServerSlot};

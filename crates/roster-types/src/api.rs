use serde::{Deserialize, Serialize};

use crate::models::{Client, ClientId};

// -- Persistence gateway --

/// Input to the persistence gateway. `mode` stays a raw string so that an
/// unrecognised mode is reported by the gateway rather than by the decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistRequest {
    pub mode: String,
    #[serde(default)]
    pub client_id: Option<ClientId>,
    pub payload: Client,
}

impl PersistRequest {
    pub fn create(payload: Client) -> Self {
        Self {
            mode: "create".into(),
            client_id: None,
            payload,
        }
    }

    pub fn update(client_id: ClientId, payload: Client) -> Self {
        Self {
            mode: "update".into(),
            client_id: Some(client_id),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistResponse {
    pub success: bool,
    pub client: Client,
}

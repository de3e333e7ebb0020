use std::path::PathBuf;

use anyhow::{Context, Result};
use roster_crypto::{StoreKey, key_from_base64};

pub struct Config {
    pub db_path: PathBuf,
    pub key: StoreKey,
}

impl Config {
    /// Reads `ROSTER_DB_PATH` (default `roster.db`) and the required
    /// `ROSTER_SECRET_KEY`.
    pub fn from_env() -> Result<Self> {
        let db_path: PathBuf = std::env::var("ROSTER_DB_PATH")
            .unwrap_or_else(|_| "roster.db".into())
            .into();
        let encoded = std::env::var("ROSTER_SECRET_KEY").unwrap_or_default();
        if encoded.trim().is_empty() {
            anyhow::bail!("ROSTER_SECRET_KEY is unset");
        }
        let key = key_from_base64(&encoded).context("ROSTER_SECRET_KEY is not a base64 32-byte key")?;
        Ok(Self { db_path, key })
    }
}

//! Roster Crypto Library
//!
//! Seals point credentials before they reach disk. One symmetric key
//! (AES-256-GCM) per store, supplied by the operator; a fresh nonce per secret.

pub mod keys;
pub mod seal;

pub use keys::{StoreKey, generate_store_key, key_from_base64, key_to_base64};
pub use seal::{SealedSecret, open_secret, seal_secret};

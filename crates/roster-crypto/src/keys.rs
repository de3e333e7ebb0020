use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

/// Key that seals point passwords in the roster database. Losing it makes
/// every stored password unreadable.
pub type StoreKey = [u8; 32];

/// Fresh key for `roster keygen`, drawn from the OS generator.
pub fn generate_store_key() -> StoreKey {
    let mut key = StoreKey::default();
    OsRng.fill_bytes(&mut key);
    key
}

/// Standard base64, the form `ROSTER_SECRET_KEY` holds.
pub fn key_to_base64(key: &StoreKey) -> String {
    BASE64.encode(key)
}

/// Parses `ROSTER_SECRET_KEY`. Surrounding whitespace from the env file is
/// ignored; anything but exactly 32 decoded bytes is refused.
pub fn key_from_base64(encoded: &str) -> Result<StoreKey> {
    let bytes = BASE64
        .decode(encoded.trim())
        .context("ROSTER_SECRET_KEY is not valid base64")?;
    StoreKey::try_from(bytes.as_slice()).map_err(|_| {
        anyhow::anyhow!("ROSTER_SECRET_KEY must decode to 32 bytes, got {}", bytes.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip_and_length_check() {
        let key = generate_store_key();
        assert_eq!(key_from_base64(&key_to_base64(&key)).unwrap(), key);
        let short = key_from_base64(&BASE64.encode([0u8; 16])).unwrap_err();
        assert!(short.to_string().contains("got 16"));
        assert_eq!(key_from_base64(&format!(" {}\n", key_to_base64(&key))).unwrap(), key);
        assert!(key_from_base64("not base64!").is_err());
    }
}

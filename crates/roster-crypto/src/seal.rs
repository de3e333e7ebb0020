use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};

use crate::keys::StoreKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedSecret {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Encrypt a credential with AES-256-GCM under a fresh 96-bit nonce.
pub fn seal_secret(key: &StoreKey, plaintext: &str) -> Result<SealedSecret> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(SealedSecret {
        ciphertext,
        nonce: nonce_bytes.to_vec(),
    })
}

pub fn open_secret(key: &StoreKey, ciphertext: &[u8], nonce: &[u8]) -> Result<String> {
    if nonce.len() != 12 {
        return Err(anyhow!("Invalid nonce length: {}", nonce.len()));
    }
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_store_key;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_store_key();
        let sealed = seal_secret(&key, "hunter2").unwrap();
        assert_ne!(sealed.ciphertext, b"hunter2");

        assert_eq!(open_secret(&key, &sealed.ciphertext, &sealed.nonce).unwrap(), "hunter2");
    }

    #[test]
    fn same_secret_seals_differently() {
        let key = generate_store_key();
        let a = seal_secret(&key, "pw").unwrap();
        let b = seal_secret(&key, "pw").unwrap();
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = seal_secret(&generate_store_key(), "pw").unwrap();
        assert!(open_secret(&generate_store_key(), &sealed.ciphertext, &sealed.nonce).is_err());
    }
}

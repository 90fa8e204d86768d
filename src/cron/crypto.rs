//! Encryption of stored query text.
//!
//! AES-256-GCM with a key derived from the configured secret via SHA-256.
//! The stored form is `base64(nonce || ciphertext)`.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::cron::{CronError, CronResult};

/// Size of AES-GCM nonce in bytes.
const NONCE_SIZE: usize = 12;

#[derive(Clone)]
pub struct QueryCipher {
    key: Option<[u8; 32]>,
}

impl std::fmt::Debug for QueryCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCipher")
            .field("configured", &self.key.is_some())
            .finish()
    }
}

impl QueryCipher {
    /// An empty secret counts as missing.
    pub fn new(secret: Option<&str>) -> Self {
        let key = secret.filter(|s| !s.is_empty()).map(|s| {
            let digest = Sha256::digest(s.as_bytes());
            let mut key = [0u8; 32];
            key.copy_from_slice(&digest);
            key
        });
        Self { key }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    fn cipher(&self) -> CronResult<Aes256Gcm> {
        let key = self.key.as_ref().ok_or(CronError::MissingQuerySecret)?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
    }

    pub fn encrypt(&self, plaintext: &str) -> CronResult<String> {
        let cipher = self.cipher()?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CronError::Encryption(e.to_string()))?;

        let mut packed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        packed.extend_from_slice(&nonce);
        packed.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(packed))
    }

    pub fn decrypt(&self, encoded: &str) -> CronResult<String> {
        let cipher = self.cipher()?;

        let packed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CronError::Decryption(e.to_string()))?;
        if packed.len() <= NONCE_SIZE {
            return Err(CronError::Decryption("ciphertext too short".to_string()));
        }

        let (nonce, ciphertext) = packed.split_at(NONCE_SIZE);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| CronError::Decryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| CronError::Decryption(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip() {
        let cipher = QueryCipher::new(Some("s3cret"));
        let sql = "UPDATE posts SET archived = true WHERE created_at < NOW() - INTERVAL '30 days'";
        let encrypted = cipher.encrypt(sql).unwrap();
        assert_ne!(encrypted, sql);
        assert_eq!(cipher.decrypt(&encrypted).unwrap(), sql);
    }

    #[test]
    fn test_same_text_encrypts_differently() {
        let cipher = QueryCipher::new(Some("s3cret"));
        assert_ne!(cipher.encrypt("SELECT 1").unwrap(), cipher.encrypt("SELECT 1").unwrap());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let encrypted = QueryCipher::new(Some("right")).encrypt("SELECT 1").unwrap();
        let err = QueryCipher::new(Some("wrong")).decrypt(&encrypted).unwrap_err();
        assert!(matches!(err, CronError::Decryption(_)));
    }

    #[test]
    fn test_missing_secret_fails() {
        let cipher = QueryCipher::new(None);
        assert!(!cipher.is_configured());
        assert!(matches!(cipher.encrypt("SELECT 1"), Err(CronError::MissingQuerySecret)));
        assert!(matches!(cipher.decrypt("abc"), Err(CronError::MissingQuerySecret)));
        assert!(!QueryCipher::new(Some("")).is_configured());
    }

    #[test]
    fn test_tampered_text_fails() {
        let cipher = QueryCipher::new(Some("s3cret"));
        assert!(matches!(cipher.decrypt("not base64!"), Err(CronError::Decryption(_))));
        assert!(matches!(cipher.decrypt("AAAA"), Err(CronError::Decryption(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_round_trip(secret in "[a-zA-Z0-9]{1,32}", text in ".{0,200}") {
            let cipher = QueryCipher::new(Some(&secret));
            let encrypted = cipher.encrypt(&text).unwrap();
            prop_assert_eq!(cipher.decrypt(&encrypted).unwrap(), text);
        }
    }
}

// ABOUTME: Authenticated encryption of secrets at rest (env documents, git tokens).
// ABOUTME: AES-256-GCM with a random nonce prepended to every ciphertext.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Size of the GCM nonce in bytes.
const NONCE_SIZE: usize = 12;

/// Size of the GCM authentication tag.
const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("encryption key cannot be empty")]
    EmptyKey,

    #[error("invalid ciphertext: too short to contain a nonce and tag")]
    InvalidCiphertext,

    #[error("ciphertext failed authentication (wrong key or tampered data)")]
    Authentication,

    #[error("encryption failed")]
    Encryption,

    #[error("ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("decrypted value is not valid UTF-8")]
    Utf8,

    #[error("invalid environment document: {0}")]
    EnvDocument(#[from] serde_json::Error),
}

/// Symmetric codec for secrets stored alongside service and project records.
///
/// The 256-bit key is the SHA-256 digest of the configured passphrase, so any
/// non-empty passphrase is accepted. Output layout is `nonce || ciphertext || tag`.
pub struct SecretCodec {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCodec").finish_non_exhaustive()
    }
}

impl SecretCodec {
    pub fn new(passphrase: &SecretString) -> Result<Self, SecretError> {
        let passphrase = passphrase.expose_secret();
        if passphrase.is_empty() {
            return Err(SecretError::EmptyKey);
        }

        let key = Sha256::digest(passphrase.as_bytes());
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| SecretError::EmptyKey)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SecretError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| SecretError::Encryption)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn decrypt(&self, sealed: &[u8]) -> Result<Vec<u8>, SecretError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SecretError::InvalidCiphertext);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| SecretError::Authentication)
    }

    /// Encrypt a string and encode the result as base64 text.
    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, SecretError> {
        self.encrypt(plaintext.as_bytes())
            .map(|sealed| STANDARD.encode(sealed))
    }

    pub fn decrypt_string(&self, encoded: &str) -> Result<String, SecretError> {
        let sealed = STANDARD.decode(encoded.trim())?;
        let plaintext = self.decrypt(&sealed)?;
        String::from_utf8(plaintext).map_err(|_| SecretError::Utf8)
    }

    /// Serialize environment variables as a JSON object, then encrypt.
    pub fn encrypt_env(&self, env: &BTreeMap<String, String>) -> Result<String, SecretError> {
        let document = serde_json::to_string(env)?;
        self.encrypt_string(&document)
    }

    pub fn decrypt_env(&self, encoded: &str) -> Result<BTreeMap<String, String>, SecretError> {
        let document = self.decrypt_string(encoded)?;
        Ok(serde_json::from_str(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec(key: &str) -> SecretCodec {
        SecretCodec::new(&SecretString::from(key.to_string())).unwrap()
    }

    #[test]
    fn round_trips_bytes() {
        let codec = codec("test-secret-key");
        let sealed = codec.encrypt(b"hello world").unwrap();
        assert_ne!(&sealed[NONCE_SIZE..], b"hello world");
        assert_eq!(codec.decrypt(&sealed).unwrap(), b"hello world");
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let codec = codec("test-secret-key");
        let a = codec.encrypt_string("same").unwrap();
        let b = codec.encrypt_string("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn short_input_is_invalid_ciphertext() {
        let codec = codec("test-secret-key");
        assert!(matches!(
            codec.decrypt(b"short"),
            Err(SecretError::InvalidCiphertext)
        ));
        assert!(matches!(
            codec.decrypt(&[0u8; NONCE_SIZE + TAG_SIZE - 1]),
            Err(SecretError::InvalidCiphertext)
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let sealed = codec("key1").encrypt(b"secret message").unwrap();
        assert!(matches!(
            codec("key2").decrypt(&sealed),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn tampering_fails_authentication() {
        let codec = codec("key1");
        let mut sealed = codec.encrypt(b"secret message").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            codec.decrypt(&sealed),
            Err(SecretError::Authentication)
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(matches!(
            SecretCodec::new(&SecretString::from(String::new())),
            Err(SecretError::EmptyKey)
        ));
    }

    #[test]
    fn env_document_round_trips() {
        let codec = codec("env-key");
        let mut env = BTreeMap::new();
        env.insert("DATABASE_URL".to_string(), "postgres://db/app".to_string());
        env.insert("RUST_LOG".to_string(), "info".to_string());

        let sealed = codec.encrypt_env(&env).unwrap();
        assert!(!sealed.contains("DATABASE_URL"));
        assert_eq!(codec.decrypt_env(&sealed).unwrap(), env);
    }

    proptest! {
        #[test]
        fn any_string_round_trips(key in "[ -~]{1,32}", value in ".*") {
            let codec = codec(&key);
            let sealed = codec.encrypt_string(&value).unwrap();
            prop_assert_eq!(codec.decrypt_string(&sealed).unwrap(), value);
        }

        #[test]
        fn other_key_never_decrypts(
            (k1, k2) in ("[ -~]{1,32}", "[ -~]{1,32}").prop_filter("keys differ", |(a, b)| a != b),
            value in proptest::collection::vec(any::<u8>(), 0..256),
        ) {
            let sealed = codec(&k1).encrypt(&value).unwrap();
            prop_assert!(matches!(
                codec(&k2).decrypt(&sealed),
                Err(SecretError::Authentication)
            ));
        }
    }
}

//! Secret encoding port
//!
//! The core never defines the on-disk encoding of secrets; it only requires
//! a reversible pair of operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

/// Port for protecting secrets at rest.
pub trait SecretStore: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, SecretError>;
}

//! Base64 secret store
//!
//! Reversible encoding, not cryptography: it keeps keys out of casual file
//! greps and satisfies the [`SecretStore`] contract. Deployments wanting
//! real protection plug an OS-keychain adapter into the same port.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use concilium_application::ports::secret_store::{SecretError, SecretStore};

pub struct Base64SecretStore;

impl SecretStore for Base64SecretStore {
    fn encrypt(&self, plaintext: &str) -> Result<String, SecretError> {
        Ok(STANDARD.encode(plaintext))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, SecretError> {
        let bytes = STANDARD
            .decode(ciphertext)
            .map_err(|error| SecretError::Decrypt(error.to_string()))?;
        String::from_utf8(bytes).map_err(|error| SecretError::Decrypt(error.to_string()))
    }
}

//! Credential encryption.
//!
//! Each tenant gets its own AES-256-GCM key, derived with PBKDF2-HMAC-SHA256
//! from the tenant id and the server-wide salt. Keys are derived on every
//! call and never stored.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use sheetpulse_protocols::DecryptedCredential;

use crate::error::VaultError;

#[cfg(test)]
#[path = "cipher_tests.rs"]
mod tests;

/// Algorithm tag written into every blob.
pub const ALGORITHM: &str = "aes-256-gcm";

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

const BLOB_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Serialized form of an encrypted credential.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptedBlob {
    v: u8,
    algorithm: String,
    nonce: String,
    auth_tag: String,
    ciphertext: String,
}

/// Encrypts and decrypts tenant secrets.
pub struct CredentialVault {
    salt: Vec<u8>,
    iterations: u32,
}

impl CredentialVault {
    /// Create a vault with the default iteration count.
    pub fn new(salt: impl AsRef<[u8]>) -> Self {
        Self::with_iterations(salt, DEFAULT_ITERATIONS)
    }

    /// Create a vault with an explicit PBKDF2 iteration count.
    pub fn with_iterations(salt: impl AsRef<[u8]>, iterations: u32) -> Self {
        Self {
            salt: salt.as_ref().to_vec(),
            iterations: iterations.max(1),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Derive the tenant's key. The buffer is wiped when dropped.
    fn derive_key(&self, tenant_id: &str) -> Zeroizing<[u8; 32]> {
        let mut key = Zeroizing::new([0u8; 32]);
        pbkdf2::pbkdf2_hmac::<Sha256>(tenant_id.as_bytes(), &self.salt, self.iterations, key.as_mut_slice());
        key
    }

    fn cipher_for(&self, tenant_id: &str) -> Aes256Gcm {
        let key = self.derive_key(tenant_id);
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()))
    }

    /// Encrypt a credential JSON document for `tenant_id`.
    pub fn encrypt(&self, plaintext_json: &str, tenant_id: &str) -> Result<String, VaultError> {
        serde_json::from_str::<serde_json::Value>(plaintext_json)
            .map_err(|e| VaultError::InvalidPayload(format!("not valid JSON at line {}", e.line())))?;

        let cipher = self.cipher_for(tenant_id);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut sealed = cipher
            .encrypt(&nonce, plaintext_json.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        // aes-gcm appends the tag to the ciphertext.
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        let blob = EncryptedBlob {
            v: BLOB_VERSION,
            algorithm: ALGORITHM.to_string(),
            nonce: BASE64.encode(nonce),
            auth_tag: BASE64.encode(tag),
            ciphertext: BASE64.encode(sealed),
        };

        serde_json::to_string(&blob).map_err(|e| VaultError::Encryption(e.to_string()))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt) for the same tenant.
    pub fn decrypt(&self, blob: &str, tenant_id: &str) -> Result<DecryptedCredential, VaultError> {
        let blob: EncryptedBlob = serde_json::from_str(blob)
            .map_err(|_| VaultError::Decryption("malformed credential blob".to_string()))?;

        if blob.v != BLOB_VERSION || blob.algorithm != ALGORITHM {
            return Err(VaultError::Decryption(format!(
                "unsupported blob format v{} ({})",
                blob.v, blob.algorithm
            )));
        }

        let nonce = decode_field(&blob.nonce, "nonce")?;
        let tag = decode_field(&blob.auth_tag, "authTag")?;
        let mut sealed = decode_field(&blob.ciphertext, "ciphertext")?;

        if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
            return Err(VaultError::Decryption("invalid nonce or tag length".to_string()));
        }
        sealed.extend_from_slice(&tag);

        let cipher = self.cipher_for(tenant_id);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_ref())
            .map_err(|_| VaultError::Decryption("authentication tag mismatch".to_string()))?;

        String::from_utf8(plaintext)
            .map(DecryptedCredential::new)
            .map_err(|_| VaultError::Decryption("plaintext is not UTF-8".to_string()))
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>, VaultError> {
    BASE64
        .decode(value)
        .map_err(|_| VaultError::Decryption(format!("{} is not valid base64", name)))
}

//! AES-GCM-256 encryption with Argon2id key derivation.
//!
//! Protects the credential store at rest. Each encryption uses a fresh
//! random 96-bit nonce; the key is derived from a passphrase that is never
//! stored alongside the blob. KDF parameters and salt are embedded in the
//! blob so decryption needs nothing but the passphrase.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng, rand_core::RngCore},
};
use argon2::{
    Argon2, Params, Version,
    password_hash::{PasswordHasher, SaltString},
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// AES-GCM nonce size per NIST SP 800-38D
const NONCE_SIZE: usize = 12;

/// AES-256 key size
const KEY_SIZE: usize = 32;

/// Argon2id salt size per RFC 9106
const SALT_SIZE: usize = 16;

/// Argon2id memory cost in KiB (64 MiB)
const MEMORY_COST: u32 = 65536;

/// Argon2id iterations
const TIME_COST: u32 = 3;

/// Argon2id lanes
const PARALLELISM: u32 = 4;

/// Key derivation parameters embedded alongside the ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    /// Random salt (16 bytes)
    pub salt: Vec<u8>,
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Iterations
    pub time_cost: u32,
    /// Parallelism factor
    pub parallelism: u32,
}

impl KdfParams {
    /// Creates parameters with a fresh random salt.
    pub fn generate() -> Self {
        let mut salt = vec![0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            salt,
            memory_cost: MEMORY_COST,
            time_cost: TIME_COST,
            parallelism: PARALLELISM,
        }
    }

    /// Validates that parameters meet the minimum security thresholds.
    ///
    /// # Errors
    /// Returns a configuration error for weakened parameters, which also
    /// catches truncated or hand-edited store files.
    pub fn validate(&self) -> crate::Result<()> {
        if self.salt.len() < SALT_SIZE {
            return Err(crate::error::OraflowError::configuration(format!(
                "KDF salt must be at least {SALT_SIZE} bytes"
            )));
        }
        if self.memory_cost < MEMORY_COST {
            return Err(crate::error::OraflowError::configuration(format!(
                "KDF memory cost must be at least {MEMORY_COST} KiB"
            )));
        }
        if self.time_cost < TIME_COST {
            return Err(crate::error::OraflowError::configuration(format!(
                "KDF time cost must be at least {TIME_COST} iterations"
            )));
        }
        if self.parallelism < 1 {
            return Err(crate::error::OraflowError::configuration(
                "KDF parallelism must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Encrypted container persisted to disk as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedBlob {
    /// Always "AES-GCM-256"
    pub algorithm: String,
    /// Random 96-bit nonce
    pub nonce: Vec<u8>,
    /// Ciphertext including the 16-byte authentication tag
    pub ciphertext: Vec<u8>,
    /// Key derivation parameters and salt
    pub kdf: KdfParams,
}

fn validate_blob(blob: &EncryptedBlob) -> crate::Result<()> {
    if blob.algorithm != "AES-GCM-256" {
        return Err(crate::error::OraflowError::configuration(format!(
            "unsupported encryption algorithm: {}",
            blob.algorithm
        )));
    }
    if blob.nonce.len() != NONCE_SIZE {
        return Err(crate::error::OraflowError::configuration(format!(
            "invalid nonce length: expected {NONCE_SIZE}, got {}",
            blob.nonce.len()
        )));
    }
    blob.kdf.validate()
}

/// Derives an AES-256 key from a passphrase using Argon2id.
/// Key material is zeroed on drop.
fn derive_key(passphrase: &str, kdf: &KdfParams) -> crate::Result<Zeroizing<[u8; KEY_SIZE]>> {
    kdf.validate()?;

    let params = Params::new(
        kdf.memory_cost,
        kdf.time_cost,
        kdf.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| {
        crate::error::OraflowError::configuration(format!("invalid Argon2 parameters: {e}"))
    })?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let salt = SaltString::encode_b64(&kdf.salt)
        .map_err(|e| crate::error::OraflowError::configuration(format!("invalid salt: {e}")))?;

    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| {
            crate::error::OraflowError::configuration(format!("key derivation failed: {e}"))
        })?;

    let hash_bytes = hash.hash.ok_or_else(|| {
        crate::error::OraflowError::configuration("key derivation produced no output")
    })?;
    if hash_bytes.as_bytes().len() != KEY_SIZE {
        return Err(crate::error::OraflowError::configuration(
            "key derivation produced an incorrect key length",
        ));
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    key.copy_from_slice(hash_bytes.as_bytes());
    Ok(key)
}

/// Encrypts `data` under a key derived from `passphrase`.
///
/// # Errors
/// Returns an error if key derivation or the cipher fails.
pub fn encrypt_blob(data: &[u8], passphrase: &str) -> crate::Result<EncryptedBlob> {
    let kdf = KdfParams::generate();
    let key = derive_key(passphrase, &kdf)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| crate::error::OraflowError::configuration(format!("encryption failed: {e}")))?;

    Ok(EncryptedBlob {
        algorithm: "AES-GCM-256".to_string(),
        nonce: nonce.to_vec(),
        ciphertext,
        kdf,
    })
}

/// Decrypts a blob, verifying its authentication tag.
///
/// # Errors
/// Fails if the passphrase is wrong, the blob was tampered with, or its
/// parameters are invalid. Callers treat any failure as "store unusable"
/// and fall back to prompting.
pub fn decrypt_blob(blob: &EncryptedBlob, passphrase: &str) -> crate::Result<Vec<u8>> {
    validate_blob(blob)?;
    let key = derive_key(passphrase, &blob.kdf)?;
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&*key));
    let nonce = Nonce::from_slice(&blob.nonce);

    cipher.decrypt(nonce, blob.ciphertext.as_slice()).map_err(|e| {
        crate::error::OraflowError::credential(format!(
            "store decryption failed (wrong key material or corrupted file): {e}"
        ))
    })
}

//! Encryption for the on-disk credential store.

pub mod encryption;

pub use encryption::{decrypt_blob, encrypt_blob, EncryptedBlob, KdfParams};

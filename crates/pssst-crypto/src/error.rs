//! Error types for key handling, message encryption and request signing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Requested key size is below the accepted minimum.
    #[error("Key too weak: {bits} bits requested, at least {min} required")]
    WeakKey { bits: usize, min: usize },

    /// Key generation failed inside the RSA backend.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A PEM blob could not be parsed or produced.
    #[error("Key format invalid: {0}")]
    KeyFormat(String),

    /// Receiver public key is empty or unparseable.
    #[error("Public key invalid")]
    InvalidKey,

    /// Private and public half of a key pair do not belong together.
    #[error("Key pair mismatch")]
    KeyMismatch,

    /// Plaintext to encrypt is empty.
    #[error("Message empty")]
    EmptyMessage,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Wrong private key, or a nonce/body that was not produced for it.
    #[error("Decryption failed")]
    Decryption,

    #[error("Signing failed: {0}")]
    Signing(String),

    /// `content-hash` header does not match `<timestamp>; <base64>`.
    #[error("Signature format invalid")]
    BadSignatureFormat,
}

pub type Result<T> = std::result::Result<T, CryptoError>;

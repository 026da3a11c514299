use std::fmt;

use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

/// Smallest RSA modulus accepted for new keys.
pub const MIN_KEY_BITS: usize = 1024;

/// Every PEM public key, SPKI or PKCS#1, carries this in its armor line.
pub const PUBLIC_KEY_MARKER: &str = "PUBLIC KEY";

/// A user's RSA key pair in PEM form. The same pair signs requests and
/// unwraps message seeds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypair {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Generate a fresh RSA key pair of `bits` bits.
pub fn generate_keypair(bits: usize) -> Result<Keypair> {
    if bits < MIN_KEY_BITS {
        return Err(CryptoError::WeakKey {
            bits,
            min: MIN_KEY_BITS,
        });
    }

    let private = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

    Keypair::from_private_key(&private)
}

impl Keypair {
    pub fn from_private_key(private: &RsaPrivateKey) -> Result<Self> {
        Ok(Self {
            public_key: encode_public_key(&private.to_public_key())?,
            private_key: encode_private_key(private)?,
        })
    }

    pub fn private(&self) -> Result<RsaPrivateKey> {
        decode_private_key(&self.private_key)
    }

    pub fn public(&self) -> Result<RsaPublicKey> {
        decode_public_key(&self.public_key)
    }

    /// Parses both halves and checks they belong together.
    pub fn validate(&self) -> Result<(RsaPrivateKey, RsaPublicKey)> {
        let private = self.private()?;
        let public = self.public()?;

        if private.to_public_key() != public {
            return Err(CryptoError::KeyMismatch);
        }

        Ok((private, public))
    }
}

/// Encode a public key as SPKI PEM (`BEGIN PUBLIC KEY`).
pub fn encode_public_key(key: &RsaPublicKey) -> Result<String> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))
}

/// Decode a public key from SPKI PEM, falling back to PKCS#1 PEM.
pub fn decode_public_key(pem: &str) -> Result<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))
}

/// Encode a private key as unencrypted PKCS#8 PEM (`BEGIN PRIVATE KEY`).
pub fn encode_private_key(key: &RsaPrivateKey) -> Result<String> {
    let pem = key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
    Ok(pem.as_str().to_owned())
}

/// Decode a private key from PKCS#8 PEM, falling back to PKCS#1 PEM.
pub fn decode_private_key(pem: &str) -> Result<RsaPrivateKey> {
    let pem = pem.trim();
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))
}

/// Whether an identity token is a PEM public key rather than a user name.
pub fn looks_like_public_key(token: &str) -> bool {
    token.contains(PUBLIC_KEY_MARKER)
}

pub fn key_bits(key: &RsaPublicKey) -> usize {
    key.size() * 8
}

/// SHA-256 over the DER encoding, lowercase hex. Safe to log.
pub fn fingerprint(key: &RsaPublicKey) -> Result<String> {
    let der = key
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyFormat(e.to_string()))?;
    Ok(hex::encode(Sha256::digest(der.as_bytes())))
}

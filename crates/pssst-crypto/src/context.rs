use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::SigningKey;
use sha2::Sha512;
use tracing::info;

use crate::error::CryptoError;
use crate::keys::{self, Keypair};
use crate::signing::{self, ContentHash, Verifier};

/// Private key file inside the key directory.
pub const PRIVATE_KEY_FILE: &str = "id_rsa";
/// Public key file inside the key directory.
pub const PUBLIC_KEY_FILE: &str = "id_rsa.pub";

/// A key pair made ready for signing, plus the verifier that goes with it.
///
/// Built once at startup and handed to whoever signs or verifies; there is
/// no process-wide key.
pub struct CryptoContext {
    keypair: Keypair,
    public: RsaPublicKey,
    signing_key: SigningKey<Sha512>,
    verifier: Verifier,
    fingerprint: String,
}

impl CryptoContext {
    pub fn new(keypair: Keypair, verifier: Verifier) -> Result<Self, CryptoError> {
        let (private, public) = keypair.validate()?;
        let fingerprint = keys::fingerprint(&public)?;

        Ok(Self {
            keypair,
            public,
            signing_key: signing::signing_key(private),
            verifier,
            fingerprint,
        })
    }

    pub fn generate(bits: usize, verifier: Verifier) -> Result<Self, CryptoError> {
        Self::new(keys::generate_keypair(bits)?, verifier)
    }

    /// Loads `id_rsa`/`id_rsa.pub` from `dir`, generating and writing a new
    /// pair of `bits` bits if either file is missing.
    pub fn load_or_generate(dir: &Path, bits: usize, verifier: Verifier) -> Result<Self> {
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        if !private_path.exists() || !public_path.exists() {
            info!("Generating {}-bit relay key pair in {}", bits, dir.display());
            let keypair = keys::generate_keypair(bits)?;

            fs::create_dir_all(dir)
                .with_context(|| format!("creating key directory {}", dir.display()))?;
            write_private(&private_path, &keypair.private_key)?;
            fs::write(&public_path, &keypair.public_key)
                .with_context(|| format!("writing {}", public_path.display()))?;
        }

        let keypair = Keypair {
            private_key: fs::read_to_string(&private_path)
                .with_context(|| format!("reading {}", private_path.display()))?,
            public_key: fs::read_to_string(&public_path)
                .with_context(|| format!("reading {}", public_path.display()))?,
        };

        let ctx = Self::new(keypair, verifier)
            .with_context(|| format!("loading relay key pair from {}", dir.display()))?;
        info!(
            "Relay key loaded ({} bits, fingerprint {})",
            keys::key_bits(&ctx.public),
            ctx.fingerprint
        );
        Ok(ctx)
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn public_key_pem(&self) -> &str {
        &self.keypair.public_key
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Sign `content` as of now.
    pub fn sign(&self, content: &[u8]) -> Result<ContentHash, CryptoError> {
        self.sign_at(content, signing::now())
    }

    pub fn sign_at(&self, content: &[u8], timestamp: i64) -> Result<ContentHash, CryptoError> {
        Ok(ContentHash {
            timestamp,
            signature: signing::sign_with(&self.signing_key, content, timestamp)?,
        })
    }

    /// Verify a header produced by the holder of this context's key.
    pub fn verify_own(&self, content: &[u8], claimed: &ContentHash) -> bool {
        self.verifier
            .verify_key_at(content, claimed, &self.public, signing::now())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("writing {}", path.display()))?;
    file.write_all(pem.as_bytes())?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &str) -> Result<()> {
    fs::write(path, pem).with_context(|| format!("writing {}", path.display()))
}

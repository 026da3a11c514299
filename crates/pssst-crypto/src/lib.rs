/// Pssst Crypto Library
///
/// RSA key pairs in PEM form, hybrid RSA-OAEP + AES-256-CFB8 message
/// envelopes, and the HMAC-then-sign scheme behind the `content-hash` header.
///
/// The relay only needs keys and signatures and builds this crate without
/// the `client` feature, so it carries no code able to open a message.

pub mod context;
#[cfg(feature = "client")]
pub mod envelope;
pub mod error;
pub mod keys;
pub mod signing;

pub use rsa;
pub use sha2;

pub use context::CryptoContext;
pub use error::CryptoError;
pub use keys::{Keypair, generate_keypair};
pub use signing::{ContentHash, Verifier};

use serde::{Deserialize, Serialize};

/// Messages queued on the relay are always encrypted.
/// The relay only sees the wrapped nonce and the ciphertext body, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub head: MessageHead,
    /// Base64 AES-256-CFB8 ciphertext.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHead {
    /// Name of the sending user.
    pub user: String,
    /// Base64 RSA-OAEP wrapped 48-byte seed.
    pub nonce: String,
    /// Unix seconds, assigned by the relay on receipt.
    pub time: i64,
}

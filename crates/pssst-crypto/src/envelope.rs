//! Hybrid encryption of message bodies.
//!
//! Each message gets a fresh 48-byte seed: bytes 0..32 key AES-256 in CFB8
//! mode, bytes 32..48 are its IV. Only the seed is wrapped for the receiver
//! with RSA-OAEP (SHA-1), so the relay never holds anything that opens a body.

use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use cfb8::cipher::{AsyncStreamCipher, KeyIvInit};
use rand_core::{OsRng, RngCore};
use rsa::{Oaep, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::error::{CryptoError, Result};
use crate::keys::{Keypair, decode_public_key};

type Aes256Cfb8Enc = cfb8::Encryptor<Aes256>;
type Aes256Cfb8Dec = cfb8::Decryptor<Aes256>;

pub const SEED_LEN: usize = 48;
const KEY_LEN: usize = 32;

/// An encrypted body and its wrapped seed, both base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub nonce: String,
    pub body: String,
}

/// Encrypt `plaintext` so only the holder of `receiver_public_key` can read it.
pub fn encrypt(receiver_public_key: &str, plaintext: &[u8]) -> Result<Sealed> {
    if receiver_public_key.trim().is_empty() {
        return Err(CryptoError::InvalidKey);
    }
    let receiver = decode_public_key(receiver_public_key).map_err(|_| CryptoError::InvalidKey)?;

    if plaintext.is_empty() {
        return Err(CryptoError::EmptyMessage);
    }

    let mut seed = [0u8; SEED_LEN];
    OsRng.fill_bytes(&mut seed);

    let mut body = plaintext.to_vec();
    Aes256Cfb8Enc::new_from_slices(&seed[..KEY_LEN], &seed[KEY_LEN..])
        .map_err(|e| CryptoError::Encryption(e.to_string()))?
        .encrypt(&mut body);

    let nonce = receiver
        .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &seed)
        .map_err(|e| CryptoError::Encryption(e.to_string()));
    seed.fill(0);

    Ok(Sealed {
        nonce: BASE64.encode(nonce?),
        body: BASE64.encode(body),
    })
}

/// Decrypt a message addressed to `keypair`.
///
/// An empty body is a no-op message and yields an empty plaintext without
/// touching the keys.
pub fn decrypt(keypair: &Keypair, sealed: &Sealed) -> Result<Vec<u8>> {
    if sealed.body.is_empty() {
        return Ok(Vec::new());
    }
    decrypt_with(&keypair.private()?, sealed)
}

/// Same as [`decrypt`] with an already parsed private key.
pub fn decrypt_with(private: &RsaPrivateKey, sealed: &Sealed) -> Result<Vec<u8>> {
    if sealed.body.is_empty() {
        return Ok(Vec::new());
    }

    let wrapped = BASE64
        .decode(&sealed.nonce)
        .map_err(|_| CryptoError::Decryption)?;
    let mut body = BASE64
        .decode(&sealed.body)
        .map_err(|_| CryptoError::Decryption)?;

    let mut seed = private
        .decrypt(Oaep::new::<Sha1>(), &wrapped)
        .map_err(|_| CryptoError::Decryption)?;

    if seed.len() != SEED_LEN {
        seed.fill(0);
        return Err(CryptoError::Decryption);
    }

    let cipher = Aes256Cfb8Dec::new_from_slices(&seed[..KEY_LEN], &seed[KEY_LEN..])
        .map_err(|_| CryptoError::Decryption);
    seed.fill(0);
    cipher?.decrypt(&mut body);

    Ok(body)
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::keys::{MIN_KEY_BITS, generate_keypair};

    fn receiver() -> &'static Keypair {
        static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
        KEYPAIR.get_or_init(|| generate_keypair(MIN_KEY_BITS).unwrap())
    }

    fn stranger() -> &'static Keypair {
        static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
        KEYPAIR.get_or_init(|| generate_keypair(MIN_KEY_BITS).unwrap())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let kp = receiver();
        for message in [&b"hello"[..], b"x", &[0u8, 255, 7, 0], "Gr\u{00fc}\u{00df}e".as_bytes()] {
            let sealed = encrypt(&kp.public_key, message).unwrap();
            assert_eq!(decrypt(kp, &sealed).unwrap(), message);
        }
    }

    #[test]
    fn long_bodies_roundtrip() {
        let kp = receiver();
        let message: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

        let sealed = encrypt(&kp.public_key, &message).unwrap();
        assert_eq!(decrypt(kp, &sealed).unwrap(), message);
    }

    #[test]
    fn cfb8_keeps_length() {
        let sealed = encrypt(&receiver().public_key, b"seventeen bytes!!").unwrap();
        assert_eq!(BASE64.decode(&sealed.body).unwrap().len(), 17);
        assert_eq!(BASE64.decode(&sealed.nonce).unwrap().len(), MIN_KEY_BITS / 8);
    }

    #[test]
    fn every_message_gets_a_fresh_seed() {
        let kp = receiver();
        let a = encrypt(&kp.public_key, b"same").unwrap();
        let b = encrypt(&kp.public_key, b"same").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.body, b.body);
    }

    #[test]
    fn empty_body_short_circuits() {
        let garbage = Keypair {
            public_key: String::new(),
            private_key: "not a key".into(),
        };
        let sealed = Sealed {
            nonce: "!!! not base64".into(),
            body: String::new(),
        };
        assert_eq!(decrypt(&garbage, &sealed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = encrypt(&receiver().public_key, b"Secret message").unwrap();
        assert!(matches!(decrypt(stranger(), &sealed), Err(CryptoError::Decryption)));
    }

    #[test]
    fn tampered_nonce_fails() {
        let kp = receiver();
        let sealed = encrypt(&kp.public_key, b"Secret message").unwrap();

        let mut wrapped = BASE64.decode(&sealed.nonce).unwrap();
        wrapped[10] ^= 0x01;
        let tampered = Sealed {
            nonce: BASE64.encode(wrapped),
            body: sealed.body.clone(),
        };
        assert!(matches!(decrypt(kp, &tampered), Err(CryptoError::Decryption)));
    }

    #[test]
    fn invalid_receiver_key_is_rejected() {
        assert!(matches!(encrypt("", b"hi"), Err(CryptoError::InvalidKey)));
        assert!(matches!(encrypt("   ", b"hi"), Err(CryptoError::InvalidKey)));
        assert!(matches!(encrypt("PUBLIC KEY", b"hi"), Err(CryptoError::InvalidKey)));
    }

    #[test]
    fn empty_plaintext_is_rejected() {
        assert!(matches!(
            encrypt(&receiver().public_key, b""),
            Err(CryptoError::EmptyMessage)
        ));
    }
}

//! Request and response authentication.
//!
//! A body is first reduced to `HMAC-SHA512(key = decimal timestamp, body)`,
//! then that digest is signed with RSASSA-PKCS1-v1_5 over SHA-512. The
//! timestamp travels next to the signature in the `content-hash` header and
//! must fall inside the verifier's grace window.

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha512;

use crate::error::{CryptoError, Result};
use crate::keys::{Keypair, decode_public_key};

type HmacSha512 = Hmac<Sha512>;

/// HTTP header carrying `<timestamp>; <base64 signature>`.
pub const HEADER: &str = "content-hash";

/// Accepted clock skew in seconds between signer and verifier.
pub const DEFAULT_GRACE_SECS: u64 = 30;

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// The keyed digest that actually gets signed.
pub fn digest(content: &[u8], timestamp: i64) -> Result<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(timestamp.to_string().as_bytes())
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    mac.update(content);

    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// Sign `content` with the private half of `keypair`.
///
/// Absent content yields an empty signature.
pub fn sign(content: Option<&[u8]>, keypair: &Keypair, timestamp: i64) -> Result<Vec<u8>> {
    let Some(content) = content else {
        return Ok(Vec::new());
    };

    let signing_key = SigningKey::<Sha512>::new(keypair.private()?);
    sign_with(&signing_key, content, timestamp)
}

pub fn sign_with(key: &SigningKey<Sha512>, content: &[u8], timestamp: i64) -> Result<Vec<u8>> {
    let digest = digest(content, timestamp)?;
    let signature = key
        .try_sign(&digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;
    Ok(signature.to_vec())
}

pub fn signing_key(private: RsaPrivateKey) -> SigningKey<Sha512> {
    SigningKey::<Sha512>::new(private)
}

/// Parsed `content-hash` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHash {
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

impl ContentHash {
    /// Strict parse: one `;`, digits before it, padded standard base64 after
    /// it, whitespace allowed only around either part.
    pub fn parse(header: &str) -> Result<Self> {
        let (timestamp, signature) = header
            .split_once(';')
            .ok_or(CryptoError::BadSignatureFormat)?;

        let timestamp = timestamp.trim();
        let signature = signature.trim();

        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CryptoError::BadSignatureFormat);
        }
        let timestamp = timestamp
            .parse::<i64>()
            .map_err(|_| CryptoError::BadSignatureFormat)?;

        if signature.is_empty() {
            return Err(CryptoError::BadSignatureFormat);
        }
        let signature = BASE64
            .decode(signature)
            .map_err(|_| CryptoError::BadSignatureFormat)?;

        Ok(Self {
            timestamp,
            signature,
        })
    }
}

impl FromStr for ContentHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.timestamp, BASE64.encode(&self.signature))
    }
}

/// Checks signatures against a bounded clock-skew window.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    grace_secs: u64,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_SECS)
    }
}

impl Verifier {
    pub fn new(grace_secs: u64) -> Self {
        Self { grace_secs }
    }

    pub fn grace_secs(&self) -> u64 {
        self.grace_secs
    }

    pub fn within_window(&self, timestamp: i64, now: i64) -> bool {
        now.abs_diff(timestamp) <= self.grace_secs
    }

    /// Verify `claimed` over `content` with a PEM public key, now.
    pub fn verify(&self, content: &[u8], claimed: &ContentHash, signer_public_key: &str) -> bool {
        self.verify_at(content, claimed, signer_public_key, now())
    }

    pub fn verify_at(
        &self,
        content: &[u8],
        claimed: &ContentHash,
        signer_public_key: &str,
        now: i64,
    ) -> bool {
        if signer_public_key.trim().is_empty() {
            return false;
        }
        match decode_public_key(signer_public_key) {
            Ok(key) => self.verify_key_at(content, claimed, &key, now),
            Err(_) => false,
        }
    }

    /// Verify the raw header text; a malformed header simply fails.
    pub fn verify_header(&self, content: &[u8], header: &str, signer_public_key: &str) -> bool {
        match ContentHash::parse(header) {
            Ok(claimed) => self.verify(content, &claimed, signer_public_key),
            Err(_) => false,
        }
    }

    /// Same as [`Verifier::verify_at`] with an already parsed key.
    pub fn verify_key_at(
        &self,
        content: &[u8],
        claimed: &ContentHash,
        key: &RsaPublicKey,
        now: i64,
    ) -> bool {
        if !self.within_window(claimed.timestamp, now) {
            return false;
        }

        let Ok(digest) = digest(content, claimed.timestamp) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(claimed.signature.as_slice()) else {
            return false;
        };

        VerifyingKey::<Sha512>::new(key.clone())
            .verify(&digest, &signature)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::keys::{MIN_KEY_BITS, generate_keypair};

    const T: i64 = 1_700_000_000;

    fn keypair() -> &'static Keypair {
        static KEYPAIR: OnceLock<Keypair> = OnceLock::new();
        KEYPAIR.get_or_init(|| generate_keypair(MIN_KEY_BITS).unwrap())
    }

    fn signed(content: &[u8], timestamp: i64) -> ContentHash {
        ContentHash {
            timestamp,
            signature: sign(Some(content), keypair(), timestamp).unwrap(),
        }
    }

    #[test]
    fn absent_content_yields_empty_signature() {
        assert!(sign(None, keypair(), T).unwrap().is_empty());
    }

    #[test]
    fn signing_is_deterministic() {
        assert_eq!(signed(b"body", T), signed(b"body", T));
        assert_ne!(signed(b"body", T), signed(b"body", T + 1));
    }

    #[test]
    fn digest_is_keyed_by_decimal_timestamp() {
        let mut mac = HmacSha512::new_from_slice(b"1700000000").unwrap();
        mac.update(b"payload");
        let expected = mac.finalize().into_bytes();

        assert_eq!(&digest(b"payload", T).unwrap()[..], &expected[..]);
    }

    #[test]
    fn valid_inside_grace_window() {
        let v = Verifier::new(30);
        let claimed = signed(b"{\"key\":1}", T);
        let pem = &keypair().public_key;

        for now in [T, T - 30, T + 30, T + 7] {
            assert!(v.verify_at(b"{\"key\":1}", &claimed, pem, now), "now = {now}");
        }
        for now in [T - 31, T + 31, 0] {
            assert!(!v.verify_at(b"{\"key\":1}", &claimed, pem, now), "now = {now}");
        }
    }

    #[test]
    fn empty_content_signs_and_verifies() {
        let claimed = signed(b"", T);
        assert!(Verifier::default().verify_at(b"", &claimed, &keypair().public_key, T));
    }

    #[test]
    fn tampering_is_detected() {
        let v = Verifier::default();
        let pem = &keypair().public_key;
        let claimed = signed(b"hello", T);

        assert!(!v.verify_at(b"hellp", &claimed, pem, T));

        let mut shifted = claimed.clone();
        shifted.timestamp += 1;
        assert!(!v.verify_at(b"hello", &shifted, pem, T));

        for byte in [0, 63, 127] {
            let mut flipped = claimed.clone();
            flipped.signature[byte] ^= 0x01;
            assert!(!v.verify_at(b"hello", &flipped, pem, T));
        }

        let mut short = claimed;
        short.signature.truncate(10);
        assert!(!v.verify_at(b"hello", &short, pem, T));
    }

    #[test]
    fn wrong_or_missing_key_fails() {
        let v = Verifier::default();
        let other = generate_keypair(MIN_KEY_BITS).unwrap();
        let claimed = signed(b"hello", T);

        assert!(!v.verify_at(b"hello", &claimed, &other.public_key, T));
        assert!(!v.verify_at(b"hello", &claimed, "", T));
        assert!(!v.verify_at(b"hello", &claimed, "garbage", T));
    }

    #[test]
    fn header_display_and_parse() {
        let claimed = ContentHash {
            timestamp: T,
            signature: vec![1, 2, 3, 4],
        };
        let header = claimed.to_string();
        assert_eq!(header, "1700000000; AQIDBA==");
        assert_eq!(header.parse::<ContentHash>().unwrap(), claimed);

        for ok in ["1700000000;AQIDBA==", " 1700000000 ;  AQIDBA== "] {
            assert_eq!(ContentHash::parse(ok).unwrap(), claimed, "{ok:?}");
        }
    }

    #[test]
    fn header_format_is_rigid() {
        for bad in [
            "",
            "1700000000",
            "1700000000 AQIDBA==",
            "; AQIDBA==",
            "-1; AQIDBA==",
            "17e9; AQIDBA==",
            "1700000000; ",
            "1700000000; AQIDBA",
            "1700000000; AQ ID BA==",
            "1700000000; AQIDBA==; extra",
            "1700000000; AQ*DBA==",
            "99999999999999999999; AQIDBA==",
        ] {
            assert!(
                matches!(ContentHash::parse(bad), Err(CryptoError::BadSignatureFormat)),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn verify_header_rejects_malformed() {
        assert!(!Verifier::default().verify_header(b"x", "nonsense", &keypair().public_key));
    }

    #[test]
    fn verify_header_accepts_fresh_signature() {
        let now = now();
        let header = signed(b"x", now).to_string();
        assert!(Verifier::default().verify_header(b"x", &header, &keypair().public_key));
    }
}

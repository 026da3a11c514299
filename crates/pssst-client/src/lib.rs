//! Client for a Pssst relay.
//!
//! Every request body is signed with the user's key and every response is
//! checked against the relay key before anything in it is trusted. Message
//! bodies are sealed for the receiver before they leave and opened after a
//! pull, so the relay only ever sees ciphertext.

pub mod error;
pub mod name;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use reqwest::{Method, StatusCode, header::CONTENT_TYPE};
use tracing::debug;

use pssst_crypto::envelope::{self, Sealed};
use pssst_crypto::keys;
use pssst_crypto::rsa::RsaPublicKey;
use pssst_crypto::rsa::pkcs1v15::SigningKey;
use pssst_crypto::sha2::Sha512;
use pssst_crypto::signing::{self, ContentHash, HEADER};
use pssst_crypto::{Keypair, Verifier};
use pssst_types::Message;
use pssst_types::api::{CreateUserRequest, PushHead, PushRequest};

pub use error::{ClientError, Result};
pub use name::Name;

/// A message taken from a box, opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pulled {
    /// Sender.
    pub user: String,
    /// Relay receipt time, unix seconds.
    pub time: i64,
    pub message: Vec<u8>,
}

struct Reply {
    status: StatusCode,
    body: Vec<u8>,
}

pub struct Client {
    http: reqwest::Client,
    base: String,
    user: String,
    keypair: Keypair,
    signing_key: SigningKey<Sha512>,
    relay_key: RsaPublicKey,
    verifier: Verifier,
    /// Receiver keys already fetched from the relay.
    known_keys: Mutex<HashMap<String, String>>,
}

impl Client {
    /// Connect to the relay at `base_url`, trusting the key it presents.
    ///
    /// The key is only accepted if the `/key` response is signed with it.
    pub async fn connect(base_url: &str, user: &str, keypair: Keypair) -> Result<Self> {
        let http = reqwest::Client::new();
        let base = base_url.trim_end_matches('/').to_string();

        let response = http.get(format!("{base}/key")).send().await?;
        let header = response
            .headers()
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        let pem = std::str::from_utf8(&body).map_err(|_| ClientError::Verification)?;
        let relay_key = keys::decode_public_key(pem)?;
        verify(&Verifier::default(), &relay_key, header.as_deref(), &body)?;

        Self::build(http, base, user, keypair, relay_key)
    }

    /// Use a relay key obtained out of band.
    pub fn with_relay_key(
        base_url: &str,
        user: &str,
        keypair: Keypair,
        relay_public_key: &str,
    ) -> Result<Self> {
        let relay_key = keys::decode_public_key(relay_public_key)?;
        let base = base_url.trim_end_matches('/').to_string();
        Self::build(reqwest::Client::new(), base, user, keypair, relay_key)
    }

    fn build(
        http: reqwest::Client,
        base: String,
        user: &str,
        keypair: Keypair,
        relay_key: RsaPublicKey,
    ) -> Result<Self> {
        let name = Name::new(user, None)?;
        let (private, _) = keypair.validate()?;

        Ok(Self {
            http,
            base,
            user: name.user,
            keypair,
            signing_key: signing::signing_key(private),
            relay_key,
            verifier: Verifier::default(),
            known_keys: Mutex::new(HashMap::new()),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn relay_fingerprint(&self) -> Result<String> {
        Ok(keys::fingerprint(&self.relay_key)?)
    }

    /// Register this client's user with its public key.
    pub async fn create_user(&self) -> Result<()> {
        let body = serde_json::to_vec(&CreateUserRequest {
            key: self.keypair.public_key.clone(),
        })?;
        self.call(Method::POST, &self.user, Some(body)).await?;
        Ok(())
    }

    pub async fn delete_user(&self) -> Result<()> {
        self.call(Method::DELETE, &self.user, None).await?;
        Ok(())
    }

    pub async fn create_box(&self, box_name: &str) -> Result<()> {
        let name = Name::new(&self.user, Some(box_name))?;
        self.call(Method::POST, &name.path(), None).await?;
        Ok(())
    }

    pub async fn delete_box(&self, box_name: &str) -> Result<()> {
        let name = Name::new(&self.user, Some(box_name))?;
        self.call(Method::DELETE, &name.path(), None).await?;
        Ok(())
    }

    /// Public key of `user` in PEM form.
    pub async fn find(&self, user: &str) -> Result<String> {
        let name = Name::new(user, None)?;
        let reply = self
            .call(Method::GET, &format!("{}/key", name.user), None)
            .await?;
        String::from_utf8(reply.body).map_err(|_| ClientError::Verification)
    }

    /// Box names of this user, sorted.
    pub async fn list(&self) -> Result<Vec<String>> {
        let reply = self
            .call(Method::GET, &format!("{}/list", self.user), None)
            .await?;
        Ok(serde_json::from_slice(&reply.body)?)
    }

    /// Seal `message` for each receiver and push it, signed as this user.
    pub async fn push(&self, receivers: &[Name], message: &[u8]) -> Result<()> {
        for receiver in receivers {
            let key = self.receiver_key(&receiver.user).await?;
            let sealed = envelope::encrypt(&key, message)?;

            let body = serde_json::to_vec(&PushRequest {
                head: PushHead {
                    user: self.user.clone(),
                    nonce: sealed.nonce,
                    time: None,
                },
                body: sealed.body,
            })?;

            self.call(Method::PUT, &receiver.path(), Some(body)).await?;
            debug!("Pushed message to {}", receiver);
        }
        Ok(())
    }

    /// Take the oldest message from `box_name` (default box when `None`).
    pub async fn pull(&self, box_name: Option<&str>) -> Result<Option<Pulled>> {
        let name = Name::new(&self.user, box_name)?;
        let reply = self.call(Method::GET, &name.path(), None).await?;

        if reply.status == StatusCode::NO_CONTENT || reply.body.is_empty() {
            return Ok(None);
        }

        let message: Message = serde_json::from_slice(&reply.body)?;
        let sealed = Sealed {
            nonce: message.head.nonce,
            body: message.body,
        };

        Ok(Some(Pulled {
            user: message.head.user,
            time: message.head.time,
            message: envelope::decrypt(&self.keypair, &sealed)?,
        }))
    }

    async fn receiver_key(&self, user: &str) -> Result<String> {
        let cached = self
            .known_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        let key = self.find(user).await?;
        self.known_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.to_string(), key.clone());
        Ok(key)
    }

    /// Signed request to `/1/{path}`; any non-2xx becomes `Rejected`.
    async fn call(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Reply> {
        let body = body.unwrap_or_default();
        let timestamp = signing::now();
        let content_hash = ContentHash {
            timestamp,
            signature: signing::sign_with(&self.signing_key, &body, timestamp)?,
        };

        let mut request = self
            .http
            .request(method.clone(), format!("{}/1/{}", self.base, path))
            .header(HEADER, content_hash.to_string());
        if !body.is_empty() {
            request = request.header(CONTENT_TYPE, "application/json");
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        let header = response
            .headers()
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await?;

        verify(&self.verifier, &self.relay_key, header.as_deref(), &body)?;
        debug!("{} /1/{} -> {}", method, path, status);

        if !status.is_success() {
            return Err(ClientError::Rejected {
                status,
                message: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(Reply {
            status,
            body: body.to_vec(),
        })
    }
}

fn verify(verifier: &Verifier, key: &RsaPublicKey, header: Option<&str>, body: &[u8]) -> Result<()> {
    let claimed = header
        .ok_or(ClientError::Verification)?
        .parse::<ContentHash>()
        .map_err(|_| ClientError::Verification)?;

    if verifier.verify_key_at(body, &claimed, key, signing::now()) {
        Ok(())
    } else {
        Err(ClientError::Verification)
    }
}

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    response::{IntoResponse, Response},
};

use pssst_crypto::keys::looks_like_public_key;
use pssst_crypto::signing::HEADER;
use pssst_crypto::{ContentHash, Verifier};
use pssst_db::Store;
use pssst_types::UserRecord;

use crate::error::ApiError;

/// Raw request body together with the `content-hash` header that claims to
/// sign it. The body is kept as received so verification sees the exact
/// bytes the client signed.
#[derive(Debug, Clone)]
pub struct SignedBody {
    pub content_hash: Option<String>,
    pub body: Bytes,
}

impl<S> FromRequest<S> for SignedBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_hash = req
            .headers()
            .get(HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        Ok(Self { content_hash, body })
    }
}

/// Whose key a request must be signed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signer {
    /// Key supplied inline, as on user creation.
    Key(String),
    /// Registered user whose stored key applies.
    User(String),
}

impl Signer {
    /// A token carrying the PEM public key marker is a key, anything else a
    /// user name.
    pub fn from_token(token: &str) -> Self {
        if looks_like_public_key(token) {
            Signer::Key(token.to_string())
        } else {
            Signer::User(token.to_string())
        }
    }
}

/// Resolve the signer's PEM public key. `owner_record` is the record the
/// request already loaded, reused when the signer is the owner.
pub fn resolve_key(
    store: &dyn Store,
    signer: &Signer,
    owner: &str,
    owner_record: Option<&UserRecord>,
) -> Result<String, ApiError> {
    let name = match signer {
        Signer::Key(pem) => return Ok(pem.clone()),
        Signer::User(name) => name,
    };

    let fetched;
    let record = if name == owner {
        owner_record
    } else {
        fetched = store.get(name)?;
        fetched.as_ref()
    };

    match record {
        Some(UserRecord::Active(user)) => Ok(user.key.clone()),
        _ => Err(ApiError::UnknownSigner),
    }
}

/// Check `signed` against `key` within the verifier's grace window.
pub fn verify(verifier: &Verifier, signed: &SignedBody, key: &str) -> Result<(), ApiError> {
    let claimed = signed
        .content_hash
        .as_deref()
        .ok_or(ApiError::BadSignatureFormat)?
        .parse::<ContentHash>()
        .map_err(|_| ApiError::BadSignatureFormat)?;

    if verifier.verify(&signed.body, &claimed, key) {
        Ok(())
    } else {
        Err(ApiError::InvalidSignature)
    }
}

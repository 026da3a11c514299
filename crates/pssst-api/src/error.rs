use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use pssst_types::MailboxError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Mailbox(#[from] MailboxError),

    /// Signer name does not resolve to an active user.
    #[error("Verification failed")]
    UnknownSigner,

    /// `content-hash` header missing or malformed.
    #[error("Verification failed")]
    BadSignatureFormat,

    /// Signature invalid or outside the grace window.
    #[error("Verification failed")]
    InvalidSignature,

    #[error("Public key invalid")]
    InvalidPublicKey,

    #[error("{0}")]
    MalformedBody(&'static str),

    #[error("Not found")]
    NotFound,

    #[error("Store failure: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Text of a 500 response, withheld from the body unless the relay runs in
/// debug mode. The signing middleware decides.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Mailbox(err) => match err {
                MailboxError::NameInvalid | MailboxError::BoxNameInvalid => StatusCode::BAD_REQUEST,
                MailboxError::NameRestricted | MailboxError::BoxReserved => StatusCode::FORBIDDEN,
                MailboxError::UserExists | MailboxError::BoxExists => StatusCode::CONFLICT,
                MailboxError::UserNotFound | MailboxError::BoxNotFound => StatusCode::NOT_FOUND,
                MailboxError::UserDeleted => StatusCode::GONE,
                MailboxError::QuotaExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            },
            ApiError::UnknownSigner => StatusCode::NOT_FOUND,
            ApiError::BadSignatureFormat => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ApiError::InvalidPublicKey | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{}", self);
            let mut response = status.into_response();
            response.extensions_mut().insert(ErrorDetail(self.to_string()));
            return response;
        }

        if matches!(
            self,
            ApiError::UnknownSigner | ApiError::BadSignatureFormat | ApiError::InvalidSignature
        ) {
            warn!("Request rejected: {:?}", self);
        }

        (status, self.to_string()).into_response()
    }
}

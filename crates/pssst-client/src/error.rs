use reqwest::StatusCode;

use pssst_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Response invalid: {0}")]
    Json(#[from] serde_json::Error),

    /// The relay answered, but not with a 2xx.
    #[error("HTTP status {status}: {message}")]
    Rejected { status: StatusCode, message: String },

    /// Response missing a signature or not signed by the relay key.
    #[error("Verification failed")]
    Verification,

    #[error("User name invalid")]
    NameInvalid,
}

pub type Result<T> = std::result::Result<T, ClientError>;

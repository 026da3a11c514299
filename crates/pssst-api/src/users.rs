use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use pssst_crypto::keys;
use pssst_types::UserRecord;
use pssst_types::api::CreateUserRequest;
use pssst_types::mailbox::{require_active, validate_user_name};

use crate::auth::{SignedBody, Signer};
use crate::error::ApiError;
use crate::state::{self, AppState, Persist};

/// `POST /1/{user}`, signed by the key being registered.
pub async fn create_user(
    State(state): State<AppState>,
    Path(user): Path<String>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_name(&user)?;

    let req: CreateUserRequest = serde_json::from_slice(&signed.body)
        .map_err(|_| ApiError::MalformedBody("Request body invalid"))?;
    let signer = Signer::from_token(&req.key);

    let quota = state.config.quota;
    let policy = state.policy.clone();
    let name = user.clone();

    let fingerprint = state::transact(&state, &user, signer, signed, move |existing| {
        let record = UserRecord::create(&name, req.key, quota, existing.as_ref(), &policy)?;

        let public = keys::decode_public_key(record.public_key()?)
            .map_err(|_| ApiError::InvalidPublicKey)?;
        let fingerprint = keys::fingerprint(&public).map_err(|_| ApiError::InvalidPublicKey)?;

        Ok((fingerprint, Persist::Record(record)))
    })
    .await?;

    info!("User {} created (key {})", user, fingerprint);
    Ok("User created")
}

/// `DELETE /1/{user}`. The record stays behind in the deleted state so the
/// name cannot be registered again.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user): Path<String>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_name(&user)?;

    let signer = Signer::User(user.clone());
    state::transact(&state, &user, signer, signed, |record| {
        let mut record = require_active(record)?;
        record.disable()?;
        Ok(((), Persist::Record(record)))
    })
    .await?;

    info!("User {} deleted", user);
    Ok("User deleted")
}

/// `GET /1/{user}/key`, unauthenticated.
pub async fn find_key(state: &AppState, user: &str) -> Result<String, ApiError> {
    validate_user_name(user)?;

    let record = require_active(state::lookup(state, user).await?)?;
    Ok(record.public_key()?.to_string())
}

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use tracing::{debug, info};

use pssst_crypto::signing;
use pssst_types::api::PushRequest;
use pssst_types::Message;
use pssst_types::mailbox::{DEFAULT_BOX, require_active, validate_box_name, validate_user_name};

use crate::auth::{SignedBody, Signer};
use crate::error::ApiError;
use crate::state::{self, AppState, Persist};
use crate::users;

/// `GET /1/{user}/{box}`: the key and list pseudo boxes, else a pull.
pub async fn get_box(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    signed: SignedBody,
) -> Result<Response, ApiError> {
    match name.as_str() {
        "key" => Ok(users::find_key(&state, &user).await?.into_response()),
        "list" => Ok(list(&state, &user, signed).await?.into_response()),
        _ => pull(&state, &user, &name, signed).await,
    }
}

/// `GET /1/{user}`
pub async fn pull_default(
    State(state): State<AppState>,
    Path(user): Path<String>,
    signed: SignedBody,
) -> Result<Response, ApiError> {
    pull(&state, &user, DEFAULT_BOX, signed).await
}

/// `PUT /1/{user}/{box}`
pub async fn push_box(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    push(&state, &user, &name, signed).await
}

/// `PUT /1/{user}`
pub async fn push_default(
    State(state): State<AppState>,
    Path(user): Path<String>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    push(&state, &user, DEFAULT_BOX, signed).await
}

/// `POST /1/{user}/{box}`
pub async fn create_box(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_name(&user)?;
    validate_box_name(&name)?;

    let signer = Signer::User(user.clone());
    let box_name = name.clone();
    state::transact(&state, &user, signer, signed, move |record| {
        let mut record = require_active(record)?;
        record.create_box(&box_name)?;
        Ok(((), Persist::Record(record)))
    })
    .await?;

    info!("Box {}.{} created", user, name);
    Ok("Box created")
}

/// `DELETE /1/{user}/{box}`. Pending messages go with the box.
pub async fn delete_box(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    signed: SignedBody,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_name(&user)?;
    validate_box_name(&name)?;

    let signer = Signer::User(user.clone());
    let box_name = name.clone();
    state::transact(&state, &user, signer, signed, move |record| {
        let mut record = require_active(record)?;
        record.erase_box(&box_name)?;
        Ok(((), Persist::Record(record)))
    })
    .await?;

    info!("Box {}.{} deleted", user, name);
    Ok("Box deleted")
}

async fn list(state: &AppState, user: &str, signed: SignedBody) -> Result<Json<Vec<String>>, ApiError> {
    validate_user_name(user)?;

    let signer = Signer::User(user.to_string());
    let boxes = state::transact(state, user, signer, signed, |record| {
        let boxes = require_active(record)?.list_boxes()?;
        Ok((boxes, Persist::Nothing))
    })
    .await?;

    Ok(Json(boxes))
}

/// Signed by the sender named in the message head, not by the owner.
async fn push(
    state: &AppState,
    user: &str,
    name: &str,
    signed: SignedBody,
) -> Result<&'static str, ApiError> {
    validate_user_name(user)?;
    validate_box_name(name)?;

    let req: PushRequest = serde_json::from_slice(&signed.body)
        .map_err(|_| ApiError::MalformedBody("Message invalid"))?;

    if B64.decode(&req.head.nonce).is_err() || B64.decode(&req.body).is_err() {
        return Err(ApiError::MalformedBody("Message invalid"));
    }

    let sender = req.head.user.clone();
    let signer = Signer::User(sender.clone());
    let box_name = name.to_string();

    state::transact(state, user, signer, signed, move |record| {
        let mut record = require_active(record)?;
        let now = signing::now();
        record.push(&box_name, req.into_message(now), now)?;
        Ok(((), Persist::Record(record)))
    })
    .await?;

    info!("Message from {} pushed into {}.{}", sender, user, name);
    Ok("Message sent")
}

/// Verified as the owner. An empty box answers 204 and writes nothing.
async fn pull(
    state: &AppState,
    user: &str,
    name: &str,
    signed: SignedBody,
) -> Result<Response, ApiError> {
    validate_user_name(user)?;
    validate_box_name(name)?;

    let signer = Signer::User(user.to_string());
    let box_name = name.to_string();

    let message: Option<Message> = state::transact(state, user, signer, signed, move |record| {
        let mut record = require_active(record)?;
        match record.pull(&box_name)? {
            Some(message) => Ok((Some(message), Persist::Record(record))),
            None => Ok((None, Persist::Nothing)),
        }
    })
    .await?;

    match message {
        Some(message) => {
            info!("Message pulled from {}.{}", user, name);
            Ok(Json(message).into_response())
        }
        None => {
            debug!("Box {}.{} is empty", user, name);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

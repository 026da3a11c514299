use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::error;

use pssst_crypto::{CryptoContext, Verifier};
use pssst_db::Store;
use pssst_types::{NamePolicy, UserRecord};

use crate::auth::{self, SignedBody, Signer};
use crate::config::RelayConfig;
use crate::error::ApiError;
use crate::locks::UserLocks;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub crypto: CryptoContext,
    pub config: RelayConfig,
    /// Checks request signatures with the configured grace window.
    pub verifier: Verifier,
    pub policy: NamePolicy,
    pub locks: UserLocks,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn Store>, crypto: CryptoContext, config: RelayConfig) -> Result<AppState> {
        let policy = NamePolicy::new(config.allow.as_deref(), config.deny.as_deref())
            .context("invalid user name policy")?;

        Ok(Arc::new(Self {
            store,
            crypto,
            verifier: Verifier::new(config.grace_secs),
            config,
            policy,
            locks: UserLocks::new(),
        }))
    }
}

/// What an operation wants written back after it ran.
pub enum Persist {
    Nothing,
    Record(UserRecord),
}

/// Verify a request and apply `op` to the owner's record under the owner's
/// lock.
///
/// The owner record is read, the signer's key resolved and the signature
/// checked before `op` sees the record; `op` gets the raw lookup result so
/// that user creation can observe an absent record. Store access runs on the
/// blocking pool, and the lock moves with it: a cancelled request releases
/// the owner only once its write has landed.
pub async fn transact<T, F>(
    state: &AppState,
    owner: &str,
    signer: Signer,
    signed: SignedBody,
    op: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(Option<UserRecord>) -> Result<(T, Persist), ApiError> + Send + 'static,
{
    let guard = state.locks.acquire(owner).await;

    let state = state.clone();
    let owner = owner.to_string();

    tokio::task::spawn_blocking(move || {
        let _guard = guard;
        let record = state.store.get(&owner)?;

        let key = auth::resolve_key(state.store.as_ref(), &signer, &owner, record.as_ref())?;
        auth::verify(&state.verifier, &signed, &key)?;

        let (out, persist) = op(record)?;
        if let Persist::Record(record) = persist {
            state.store.set(&owner, &record)?;
        }

        Ok::<_, ApiError>(out)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.to_string())
    })?
}

/// Read a record without authentication.
pub async fn lookup(state: &AppState, name: &str) -> Result<Option<UserRecord>, ApiError> {
    let state = state.clone();
    let name = name.to_string();

    tokio::task::spawn_blocking(move || state.store.get(&name).map_err(ApiError::from))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.to_string())
        })?
}

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pssst_api::{AppState, AppStateInner, RelayConfig};
use pssst_crypto::keys::MIN_KEY_BITS;
use pssst_crypto::signing::{self, ContentHash, HEADER};
use pssst_crypto::{CryptoContext, Keypair, Verifier, generate_keypair};
use pssst_db::{MemoryStore, Store};

fn cached(cell: &'static OnceLock<Keypair>) -> &'static Keypair {
    cell.get_or_init(|| generate_keypair(MIN_KEY_BITS).unwrap())
}

pub fn relay_keys() -> &'static Keypair {
    static KEY: OnceLock<Keypair> = OnceLock::new();
    cached(&KEY)
}

pub fn alice() -> &'static Keypair {
    static KEY: OnceLock<Keypair> = OnceLock::new();
    cached(&KEY)
}

pub fn bob() -> &'static Keypair {
    static KEY: OnceLock<Keypair> = OnceLock::new();
    cached(&KEY)
}

pub struct Relay {
    pub app: Router,
    pub state: AppState,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Reply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub fn relay() -> Relay {
    relay_with(RelayConfig::default(), Arc::new(MemoryStore::new()))
}

pub fn relay_with(config: RelayConfig, store: Arc<dyn Store>) -> Relay {
    let crypto = CryptoContext::new(relay_keys().clone(), Verifier::default()).unwrap();
    let state = AppStateInner::new(store, crypto, config).unwrap();

    Relay {
        app: pssst_api::router(state.clone()),
        state,
    }
}

pub fn content_hash(body: &[u8], keypair: &Keypair, timestamp: i64) -> String {
    ContentHash {
        timestamp,
        signature: signing::sign(Some(body), keypair, timestamp).unwrap(),
    }
    .to_string()
}

impl Relay {
    /// Send a request signed by `signer` now.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: &str,
        signer: Option<&Keypair>,
    ) -> Reply {
        let header = signer.map(|kp| content_hash(body.as_bytes(), kp, signing::now()));
        self.send_raw(method, uri, body, header.as_deref()).await
    }

    /// Send a request with an arbitrary `content-hash` header. Every reply is
    /// checked to carry a valid relay signature.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        body: &str,
        header: Option<&str>,
    ) -> Reply {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(header) = header {
            req = req.header(HEADER, header);
        }
        let req = req.body(Body::from(body.to_string())).unwrap();

        let response = self.app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        let claimed: ContentHash = headers
            .get(HEADER)
            .expect("response must be signed")
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(
            Verifier::default().verify(&body, &claimed, &relay_keys().public_key),
            "response signature must verify"
        );

        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn create_user(&self, name: &str, keypair: &Keypair) -> Reply {
        let body = serde_json::json!({ "key": keypair.public_key }).to_string();
        self.send(Method::POST, &format!("/1/{name}"), &body, Some(keypair))
            .await
    }

    pub async fn push(&self, to: &str, from: &str, keypair: &Keypair, body: &str) -> Reply {
        let message = serde_json::json!({
            "head": { "user": from, "nonce": "bm9uY2U=" },
            "body": body,
        })
        .to_string();
        self.send(Method::PUT, to, &message, Some(keypair)).await
    }
}

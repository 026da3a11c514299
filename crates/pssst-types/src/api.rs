use serde::{Deserialize, Serialize};

use crate::models::{Message, MessageHead};

// -- Users --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    /// PEM encoded public key of the new user.
    pub key: String,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushRequest {
    pub head: PushHead,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushHead {
    /// The sender; the request is verified against this user's key.
    pub user: String,
    pub nonce: String,
    /// Accepted for compatibility with older clients and always discarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

impl PushRequest {
    /// Stamps the request with the relay's receipt time.
    pub fn into_message(self, time: i64) -> Message {
        Message {
            head: MessageHead {
                user: self.head.user,
                nonce: self.head.nonce,
                time,
            },
            body: self.body,
        }
    }
}

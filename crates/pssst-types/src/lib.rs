//! Shared types of the Pssst relay: wire bodies, queued messages and the
//! mailbox record every endpoint operates on.

pub mod api;
pub mod mailbox;
pub mod models;

pub use mailbox::{ActiveUser, MailboxError, NamePolicy, UserRecord};
pub use models::{Message, MessageHead};

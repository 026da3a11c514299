//! The mailbox record of a single user and the rules guarding it.
//!
//! Everything here is pure in-memory logic. Loading and persisting a
//! [`UserRecord`] is the store's job; serializing access to one record is the
//! orchestrator's.

use std::collections::{BTreeMap, VecDeque};
use std::io;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Message;

/// Box every new user starts with.
pub const DEFAULT_BOX: &str = "box";

/// Box names a client can never create or erase.
pub const RESERVED_BOXES: &[&str] = &["box", "key", "max", "list"];

/// 512 MiB, the largest value a single Redis string could hold in the
/// original deployment.
pub const DEFAULT_QUOTA: u64 = 536_870_912;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MailboxError {
    #[error("User name invalid")]
    NameInvalid,
    #[error("Box name invalid")]
    BoxNameInvalid,
    #[error("User name restricted")]
    NameRestricted,
    #[error("User already exists")]
    UserExists,
    #[error("User not found")]
    UserNotFound,
    #[error("User was deleted")]
    UserDeleted,
    #[error("Box name restricted")]
    BoxReserved,
    #[error("Box already exists")]
    BoxExists,
    #[error("Box not found")]
    BoxNotFound,
    #[error("User reached quota")]
    QuotaExceeded,
}

pub type Result<T> = std::result::Result<T, MailboxError>;

/// `^[a-z0-9]{2,63}$`
fn is_valid_name(name: &str) -> bool {
    (2..=63).contains(&name.len())
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

pub fn validate_user_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MailboxError::NameInvalid)
    }
}

pub fn validate_box_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(MailboxError::BoxNameInvalid)
    }
}

pub fn is_reserved_box(name: &str) -> bool {
    RESERVED_BOXES.contains(&name)
}

/// Operator policy on which syntactically valid names may register.
#[derive(Debug, Clone, Default)]
pub struct NamePolicy {
    allow: Option<Regex>,
    deny: Option<Regex>,
}

impl NamePolicy {
    pub fn new(allow: Option<&str>, deny: Option<&str>) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            allow: allow.map(Regex::new).transpose()?,
            deny: deny.map(Regex::new).transpose()?,
        })
    }

    pub fn permits(&self, name: &str) -> bool {
        let allowed = self.allow.as_ref().is_none_or(|re| re.is_match(name));
        let denied = self.deny.as_ref().is_some_and(|re| re.is_match(name));
        allowed && !denied
    }
}

/// Persisted state of a user name.
///
/// A deleted user keeps its record so the name can never be registered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UserRecord {
    Active(ActiveUser),
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    /// PEM encoded public key.
    pub key: String,
    /// Quota in bytes of the serialized record.
    pub max: u64,
    #[serde(rename = "box")]
    pub boxes: BTreeMap<String, VecDeque<Message>>,
}

/// Resolves a store lookup into a live record.
pub fn require_active(record: Option<UserRecord>) -> Result<UserRecord> {
    match record {
        None => Err(MailboxError::UserNotFound),
        Some(UserRecord::Deleted) => Err(MailboxError::UserDeleted),
        Some(record) => Ok(record),
    }
}

impl UserRecord {
    /// Registers `name`, checking syntax, operator policy and prior existence
    /// (including deleted records) in that order.
    pub fn create(
        name: &str,
        key: String,
        quota: u64,
        existing: Option<&UserRecord>,
        policy: &NamePolicy,
    ) -> Result<Self> {
        validate_user_name(name)?;

        if !policy.permits(name) {
            return Err(MailboxError::NameRestricted);
        }

        if existing.is_some() {
            return Err(MailboxError::UserExists);
        }

        let mut boxes = BTreeMap::new();
        boxes.insert(DEFAULT_BOX.to_string(), VecDeque::new());

        Ok(UserRecord::Active(ActiveUser {
            key,
            max: quota,
            boxes,
        }))
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, UserRecord::Deleted)
    }

    /// Moves the user into the terminal deleted state, dropping key and boxes.
    pub fn disable(&mut self) -> Result<()> {
        self.active()?;
        *self = UserRecord::Deleted;
        Ok(())
    }

    pub fn active(&self) -> Result<&ActiveUser> {
        match self {
            UserRecord::Active(user) => Ok(user),
            UserRecord::Deleted => Err(MailboxError::UserDeleted),
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveUser> {
        match self {
            UserRecord::Active(user) => Ok(user),
            UserRecord::Deleted => Err(MailboxError::UserDeleted),
        }
    }

    pub fn public_key(&self) -> Result<&str> {
        Ok(&self.active()?.key)
    }

    /// Box names in ascending order.
    pub fn list_boxes(&self) -> Result<Vec<String>> {
        Ok(self.active()?.boxes.keys().cloned().collect())
    }

    pub fn create_box(&mut self, name: &str) -> Result<()> {
        validate_box_name(name)?;

        if is_reserved_box(name) {
            return Err(MailboxError::BoxReserved);
        }

        self.ensure_under_quota()?;

        let user = self.active_mut()?;
        if user.boxes.contains_key(name) {
            return Err(MailboxError::BoxExists);
        }

        user.boxes.insert(name.to_string(), VecDeque::new());
        Ok(())
    }

    /// Removes a box together with any pending messages.
    pub fn erase_box(&mut self, name: &str) -> Result<()> {
        validate_box_name(name)?;

        if is_reserved_box(name) {
            return Err(MailboxError::BoxReserved);
        }

        self.active_mut()?
            .boxes
            .remove(name)
            .map(|_| ())
            .ok_or(MailboxError::BoxNotFound)
    }

    /// Appends `message` to the tail of `box_name`, overwriting its time with
    /// the relay's receipt time.
    pub fn push(&mut self, box_name: &str, mut message: Message, now: i64) -> Result<()> {
        validate_box_name(box_name)?;

        if !self.active()?.boxes.contains_key(box_name) {
            return Err(MailboxError::BoxNotFound);
        }

        self.ensure_under_quota()?;

        message.head.time = now;

        self.active_mut()?
            .boxes
            .get_mut(box_name)
            .ok_or(MailboxError::BoxNotFound)?
            .push_back(message);
        Ok(())
    }

    /// Removes the head of `box_name`; `None` means the box is empty.
    pub fn pull(&mut self, box_name: &str) -> Result<Option<Message>> {
        validate_box_name(box_name)?;

        Ok(self
            .active_mut()?
            .boxes
            .get_mut(box_name)
            .ok_or(MailboxError::BoxNotFound)?
            .pop_front())
    }

    /// Byte length of the record's JSON form.
    pub fn serialized_size(&self) -> usize {
        let mut counter = ByteCounter(0);
        match serde_json::to_writer(&mut counter, self) {
            Ok(()) => counter.0,
            Err(e) => {
                tracing::warn!("Record size could not be computed: {}", e);
                usize::MAX
            }
        }
    }

    /// Whole-record check, evaluated before any growing mutation.
    fn ensure_under_quota(&self) -> Result<()> {
        let max = self.active()?.max;
        if self.serialized_size() as u64 >= max {
            Err(MailboxError::QuotaExceeded)
        } else {
            Ok(())
        }
    }
}

struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageHead;

    fn message(body: &str) -> Message {
        Message {
            head: MessageHead {
                user: "sender".into(),
                nonce: "bm9uY2U=".into(),
                time: 0,
            },
            body: body.into(),
        }
    }

    fn user() -> UserRecord {
        UserRecord::create("alice", "PUBLIC KEY".into(), DEFAULT_QUOTA, None, &NamePolicy::default())
            .unwrap()
    }

    #[test]
    fn new_user_has_default_box() {
        assert_eq!(user().list_boxes().unwrap(), vec!["box".to_string()]);
    }

    #[test]
    fn user_names_follow_syntax() {
        let policy = NamePolicy::default();
        for bad in ["a", "Alice", "al ice", "al.ice", &"a".repeat(64), ""] {
            assert_eq!(
                UserRecord::create(bad, "k".into(), 10, None, &policy).unwrap_err(),
                MailboxError::NameInvalid,
                "{bad:?}"
            );
        }
        assert!(UserRecord::create(&"a".repeat(63), "k".into(), 10, None, &policy).is_ok());
        assert!(UserRecord::create("b2", "k".into(), 10, None, &policy).is_ok());
    }

    #[test]
    fn policy_restricts_names() {
        let policy = NamePolicy::new(Some("^[a-z]+$"), Some("^(admin|root)$")).unwrap();
        assert!(policy.permits("alice"));
        assert!(!policy.permits("admin"));
        assert!(!policy.permits("bob42"));

        assert_eq!(
            UserRecord::create("root", "k".into(), 10, None, &policy).unwrap_err(),
            MailboxError::NameRestricted
        );
    }

    #[test]
    fn existing_or_deleted_name_cannot_be_recreated() {
        let policy = NamePolicy::default();
        let existing = user();
        assert_eq!(
            UserRecord::create("alice", "k".into(), 10, Some(&existing), &policy).unwrap_err(),
            MailboxError::UserExists
        );
        assert_eq!(
            UserRecord::create("alice", "k".into(), 10, Some(&UserRecord::Deleted), &policy)
                .unwrap_err(),
            MailboxError::UserExists
        );
    }

    #[test]
    fn boxes_are_sorted() {
        let mut user = user();
        user.create_box("zulu").unwrap();
        user.create_box("alpha").unwrap();
        assert_eq!(user.list_boxes().unwrap(), vec!["alpha", "box", "zulu"]);
    }

    #[test]
    fn reserved_boxes_are_rejected() {
        let mut user = user();
        for name in RESERVED_BOXES {
            assert_eq!(user.create_box(name).unwrap_err(), MailboxError::BoxReserved);
            assert_eq!(user.erase_box(name).unwrap_err(), MailboxError::BoxReserved);
        }
        assert_eq!(user.create_box("B!").unwrap_err(), MailboxError::BoxNameInvalid);
    }

    #[test]
    fn duplicate_box_conflicts() {
        let mut user = user();
        user.create_box("inbox").unwrap();
        assert_eq!(user.create_box("inbox").unwrap_err(), MailboxError::BoxExists);
    }

    #[test]
    fn erase_discards_pending_messages() {
        let mut user = user();
        user.create_box("work").unwrap();
        user.push("work", message("a"), 1).unwrap();
        user.erase_box("work").unwrap();

        assert_eq!(user.pull("work").unwrap_err(), MailboxError::BoxNotFound);
        assert_eq!(user.erase_box("work").unwrap_err(), MailboxError::BoxNotFound);
    }

    #[test]
    fn mailbox_is_fifo() {
        let mut user = user();
        for body in ["m1", "m2", "m3"] {
            user.push(DEFAULT_BOX, message(body), 42).unwrap();
        }

        for body in ["m1", "m2", "m3"] {
            let pulled = user.pull(DEFAULT_BOX).unwrap().unwrap();
            assert_eq!(pulled.body, body);
            assert_eq!(pulled.head.time, 42);
        }
        assert_eq!(user.pull(DEFAULT_BOX).unwrap(), None);
    }

    #[test]
    fn push_to_missing_box_fails() {
        let mut user = user();
        assert_eq!(
            user.push("nowhere", message("x"), 1).unwrap_err(),
            MailboxError::BoxNotFound
        );
    }

    #[test]
    fn quota_blocks_growth_but_not_reads() {
        let mut user = user();
        if let UserRecord::Active(active) = &mut user {
            active.max = user_size_after_one_push();
        }

        user.push(DEFAULT_BOX, message("first"), 1).unwrap();
        assert_eq!(
            user.push(DEFAULT_BOX, message("second"), 1).unwrap_err(),
            MailboxError::QuotaExceeded
        );
        assert_eq!(user.create_box("more").unwrap_err(), MailboxError::QuotaExceeded);

        assert!(user.list_boxes().is_ok());
        assert!(user.pull(DEFAULT_BOX).unwrap().is_some());
        user.push(DEFAULT_BOX, message("again"), 1).unwrap();
    }

    fn user_size_after_one_push() -> u64 {
        let mut probe = user();
        if let UserRecord::Active(active) = &mut probe {
            active.max = u64::MAX;
        }
        probe.push(DEFAULT_BOX, message("first"), 1).unwrap();
        probe.serialized_size() as u64
    }

    #[test]
    fn serialized_size_counts_bytes() {
        let user = user();
        assert_eq!(user.serialized_size(), serde_json::to_vec(&user).unwrap().len());

        let mut wide = user.clone();
        wide.push(DEFAULT_BOX, message("\u{00e9}\u{00e9}"), 1).unwrap();
        let mut narrow = user;
        narrow.push(DEFAULT_BOX, message("ee"), 1).unwrap();
        assert_eq!(wide.serialized_size(), narrow.serialized_size() + 2);
    }

    #[test]
    fn deleted_user_is_final() {
        let mut user = user();
        user.disable().unwrap();

        assert!(user.is_deleted());
        assert_eq!(user.public_key().unwrap_err(), MailboxError::UserDeleted);
        assert_eq!(user.list_boxes().unwrap_err(), MailboxError::UserDeleted);
        assert_eq!(user.create_box("new").unwrap_err(), MailboxError::UserDeleted);
        assert_eq!(
            user.push(DEFAULT_BOX, message("x"), 1).unwrap_err(),
            MailboxError::UserDeleted
        );
        assert_eq!(user.pull(DEFAULT_BOX).unwrap_err(), MailboxError::UserDeleted);
        assert_eq!(user.disable().unwrap_err(), MailboxError::UserDeleted);
    }

    #[test]
    fn require_active_distinguishes_missing_and_deleted() {
        assert_eq!(require_active(None).unwrap_err(), MailboxError::UserNotFound);
        assert_eq!(
            require_active(Some(UserRecord::Deleted)).unwrap_err(),
            MailboxError::UserDeleted
        );
        assert!(require_active(Some(user())).is_ok());
    }

    #[test]
    fn record_json_shape() {
        let json = serde_json::to_value(user()).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["key"], "PUBLIC KEY");
        assert_eq!(json["box"]["box"], serde_json::json!([]));

        let deleted = serde_json::to_value(UserRecord::Deleted).unwrap();
        assert_eq!(deleted, serde_json::json!({"state": "deleted"}));
    }
}

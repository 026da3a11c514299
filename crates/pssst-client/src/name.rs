use std::fmt;
use std::str::FromStr;

use pssst_types::mailbox::{validate_box_name, validate_user_name};

use crate::error::ClientError;

const PREFIX: &str = "pssst.";

/// A canonical address `pssst.<user>[.<box>]`. The prefix is optional on
/// input and names are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub user: String,
    pub box_name: Option<String>,
}

impl Name {
    pub fn new(user: &str, box_name: Option<&str>) -> Result<Self, ClientError> {
        let name = match box_name {
            Some(box_name) => format!("{user}.{box_name}"),
            None => user.to_string(),
        };
        name.parse()
    }

    /// Relay path below `/1/`.
    pub fn path(&self) -> String {
        match &self.box_name {
            Some(box_name) => format!("{}/{}", self.user, box_name),
            None => self.user.clone(),
        }
    }
}

impl FromStr for Name {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let name = lower.strip_prefix(PREFIX).unwrap_or(lower.as_str());

        let (user, box_name) = match name.split_once('.') {
            Some((user, box_name)) => (user, Some(box_name)),
            None => (name, None),
        };

        validate_user_name(user).map_err(|_| ClientError::NameInvalid)?;
        if let Some(box_name) = box_name {
            validate_box_name(box_name).map_err(|_| ClientError::NameInvalid)?;
        }

        Ok(Self {
            user: user.to_string(),
            box_name: box_name.map(str::to_string),
        })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PREFIX, self.user)?;
        if let Some(box_name) = &self.box_name {
            write!(f, ".{}", box_name)?;
        }
        Ok(())
    }
}

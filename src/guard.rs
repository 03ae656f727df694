//! Ownership checks.
//!
//! An entry is only ever visible to the user who created it. A foreign entry
//! and a missing one produce the same [`JournalError::NotFound`], so nobody can
//! probe which identifiers exist.

use log::debug;
use serde::{Deserialize, Serialize};
use crate::entities::{Entry, User, UserId};
use crate::error::JournalError;

/// The authenticated caller, passed explicitly into every operation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

pub fn owns(identity: &Identity, entry: &Entry) -> bool {
    entry.owner == identity.user_id
}

pub fn owned(identity: &Identity, entry: Option<Entry>) -> Result<Entry, JournalError> {
    match entry {
        Some(entry) if owns(identity, &entry) => Ok(entry),
        Some(entry) => {
            debug!("entry {:?} hidden from {}", entry.entry_id, identity.username);
            Err(JournalError::NotFound)
        }
        None => Err(JournalError::NotFound),
    }
}

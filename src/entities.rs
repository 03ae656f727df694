use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::tags::TagList;

pub type UserId = Uuid;
pub type EntryKey = Uuid;

pub enum InsertResult<T> {
    Existing(T),
    New(T),
}

impl<T> InsertResult<T> {
    pub fn into_inner(self) -> T {
        match self {
            InsertResult::Existing(x) => x,
            InsertResult::New(x) => x,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, InsertResult::New(_))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    /// Tags currently labelling at least one of this user's entries.
    pub tags: TagList,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryKey,
    pub owner: UserId,
    /// Human-readable unique slug, used in URLs.
    pub entry_id: String,
    pub title: String,
    pub tags: TagList,
    pub date: NaiveDate,
    pub time_spent: String,
    pub learning: String,
    pub resources: String,
}

/// The replaceable part of an entry, as submitted through the entry form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryDraft {
    pub title: String,
    pub tags: TagList,
    pub date: NaiveDate,
    pub time_spent: String,
    pub learning: String,
    pub resources: String,
}

impl Entry {
    pub fn new(owner: UserId, entry_id: String, draft: EntryDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            entry_id,
            title: draft.title,
            tags: draft.tags,
            date: draft.date,
            time_spent: draft.time_spent,
            learning: draft.learning,
            resources: draft.resources,
        }
    }

    /// Replaces every mutable field. Owner and slug stay as they are.
    pub fn apply(&mut self, draft: EntryDraft) {
        self.title = draft.title;
        self.tags = draft.tags;
        self.date = draft.date;
        self.time_spent = draft.time_spent;
        self.learning = draft.learning;
        self.resources = draft.resources;
    }
}

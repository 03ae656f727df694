use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use itertools::Itertools;
use log::{debug, info};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use crate::entities::{Entry, EntryKey, User, UserId};
use crate::error::JournalError;
use crate::identity::EntryIdLookup;
use crate::storage::{Commit, DbOperation, Storage};
use crate::tags::TagList;

/// Users and entries, with unique indexes on username and entry slug.
#[derive(Debug, Clone, Default)]
pub struct JournalState {
    users: HashMap<UserId, User>,
    usernames: HashMap<String, UserId>,
    entries: HashMap<EntryKey, Entry>,
    entry_ids: HashMap<String, EntryKey>,
}

impl JournalState {
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values().sorted_by(|a, b| a.username.cmp(&b.username))
    }

    pub fn user_by_id(&self, user_id: &UserId) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.usernames.get(username).and_then(|id| self.users.get(id))
    }

    pub fn entry_by_entry_id(&self, entry_id: &str) -> Option<&Entry> {
        self.entry_ids.get(entry_id).and_then(|id| self.entries.get(id))
    }

    /// All entries of `owner`, newest date first.
    pub fn entries_for_owner(&self, owner: &UserId) -> Vec<Entry> {
        self.entries.values()
            .filter(|x| &x.owner == owner)
            .sorted_by(newest_first)
            .cloned()
            .collect()
    }

    /// Entries of `owner` carrying `tag`, newest date first.
    pub fn entries_for_owner_with_tag(&self, owner: &UserId, tag: &str) -> Vec<Entry> {
        self.entries.values()
            .filter(|x| &x.owner == owner && x.tags.contains(tag))
            .sorted_by(newest_first)
            .cloned()
            .collect()
    }

    fn apply(&mut self, operation: &DbOperation) -> Result<(), JournalError> {
        match operation {
            DbOperation::CreateUser { user } => {
                if self.usernames.contains_key(&user.username) {
                    return Err(JournalError::UsernameTaken);
                }
                self.usernames.insert(user.username.clone(), user.id);
                self.users.insert(user.id, user.clone());
            }
            DbOperation::SetUserTags { user_id, tags } => {
                let user = self.users.get_mut(user_id).ok_or(JournalError::UserNotFound)?;
                user.tags = tags.clone();
            }
            DbOperation::CreateEntry { entry } => {
                if !self.users.contains_key(&entry.owner) {
                    return Err(JournalError::UserNotFound);
                }
                if self.entry_ids.contains_key(&entry.entry_id) {
                    return Err(JournalError::EntryIdTaken(entry.entry_id.clone()));
                }
                self.entry_ids.insert(entry.entry_id.clone(), entry.id);
                self.entries.insert(entry.id, entry.clone());
            }
            DbOperation::UpdateEntry { entry } => {
                let existing = self.entries.get(&entry.id).ok_or(JournalError::NotFound)?;
                if existing.entry_id != entry.entry_id {
                    if self.entry_ids.contains_key(&entry.entry_id) {
                        return Err(JournalError::EntryIdTaken(entry.entry_id.clone()));
                    }
                    self.entry_ids.remove(&existing.entry_id);
                    self.entry_ids.insert(entry.entry_id.clone(), entry.id);
                }
                self.entries.insert(entry.id, entry.clone());
            }
            DbOperation::DeleteEntry { id } => {
                let entry = self.entries.remove(id).ok_or(JournalError::NotFound)?;
                self.entry_ids.remove(&entry.entry_id);
            }
        }
        Ok(())
    }
}

fn newest_first(a: &&Entry, b: &&Entry) -> std::cmp::Ordering {
    b.date.cmp(&a.date).then_with(|| a.entry_id.cmp(&b.entry_id))
}

impl EntryIdLookup for JournalState {
    type Error = JournalError;

    fn entry_id_exists(&self, entry_id: &str) -> Result<bool, Self::Error> {
        Ok(self.entry_ids.contains_key(entry_id))
    }
}

struct Inner<S> {
    state: JournalState,
    storage: S,
}

/// The journal store: in-memory relations rebuilt from the commit log on open.
///
/// Readers share [`Database::read`]. Writers go through [`Database::begin`],
/// which holds the write lock until the transaction is committed or dropped.
pub struct Database<S> {
    inner: Arc<RwLock<Inner<S>>>,
}

impl<S> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<S: Storage> Database<S> {
    pub async fn open(storage: S) -> Result<Self, JournalError> {
        info!("Starting DB import from log...");
        let commits = storage.read_all().await?;
        let mut state = JournalState::default();
        for commit in &commits {
            for operation in &commit.operations {
                state.apply(operation)?;
            }
        }
        info!("DB imported: {} commits, {} users, {} entries", commits.len(), state.user_count(), state.entry_count());
        Ok(Self {
            inner: Arc::new(RwLock::new(Inner { state, storage })),
        })
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, JournalState> {
        RwLockReadGuard::map(self.inner.read().await, |inner| &inner.state)
    }

    pub async fn begin(&self) -> Transaction<'_, S> {
        let guard = self.inner.write().await;
        let staged = guard.state.clone();
        Transaction { guard, staged, operations: Vec::new() }
    }
}

/// A unit of work holding the store's write lock.
///
/// Reads see the transaction's own writes. Nothing becomes visible to other
/// readers, or reaches the log, before [`Transaction::commit`]; dropping the
/// transaction discards it.
pub struct Transaction<'a, S> {
    guard: RwLockWriteGuard<'a, Inner<S>>,
    staged: JournalState,
    operations: Vec<DbOperation>,
}

impl<S: Storage> Transaction<'_, S> {
    pub fn insert_user(&mut self, user: User) -> Result<(), JournalError> {
        self.stage(DbOperation::CreateUser { user })
    }

    pub fn set_user_tags(&mut self, user_id: UserId, tags: TagList) -> Result<(), JournalError> {
        self.stage(DbOperation::SetUserTags { user_id, tags })
    }

    pub fn insert_entry(&mut self, entry: Entry) -> Result<(), JournalError> {
        self.stage(DbOperation::CreateEntry { entry })
    }

    pub fn update_entry(&mut self, entry: Entry) -> Result<(), JournalError> {
        self.stage(DbOperation::UpdateEntry { entry })
    }

    pub fn delete_entry(&mut self, id: EntryKey) -> Result<(), JournalError> {
        self.stage(DbOperation::DeleteEntry { id })
    }

    fn stage(&mut self, operation: DbOperation) -> Result<(), JournalError> {
        self.staged.apply(&operation)?;
        debug!("staged {}", operation.name());
        self.operations.push(operation);
        Ok(())
    }

    pub async fn commit(self) -> Result<(), JournalError> {
        let Transaction { mut guard, staged, operations } = self;
        if operations.is_empty() {
            return Ok(());
        }
        let commit = Commit { operations };
        guard.storage.write(&commit).await?;
        guard.state = staged;
        info!("committed {} operation(s)", commit.operations.len());
        Ok(())
    }
}

impl<S> Deref for Transaction<'_, S> {
    type Target = JournalState;

    fn deref(&self) -> &Self::Target {
        &self.staged
    }
}

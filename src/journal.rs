//! Request-level journal operations.
//!
//! Each write runs in one store transaction: guard check, entry change and
//! ledger reconciliation commit together or not at all.

use log::info;
use uuid::Uuid;
use crate::auth;
use crate::db::{Database, Transaction};
use crate::entities::{Entry, EntryDraft, InsertResult, User, UserId};
use crate::error::JournalError;
use crate::guard::{self, Identity};
use crate::identity::assign_entry_id;
use crate::ledger;
use crate::storage::Storage;
use crate::tags::TagList;

/// What the home page shows: the caller's entries and their live tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub entries: Vec<Entry>,
    pub tags: TagList,
}

pub struct Journal<S> {
    db: Database<S>,
}

impl<S> Clone for Journal<S> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone() }
    }
}

impl<S: Storage> Journal<S> {
    pub fn new(db: Database<S>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database<S> {
        &self.db
    }

    pub async fn username_exists(&self, username: &str) -> bool {
        self.db.read().await.user_by_username(username).is_some()
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Identity, JournalError> {
        let password_hash = auth::hash_password_blocking(password.to_string()).await?;
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            tags: TagList::new(),
        };
        let identity = Identity::from(&user);
        let mut tx = self.db.begin().await;
        tx.insert_user(user)?;
        tx.commit().await?;
        info!("registered user {}", username);
        Ok(identity)
    }

    /// Registers the user unless the name is taken; the password of an existing user is left alone.
    pub async fn ensure_user(&self, username: &str, password: &str) -> Result<InsertResult<Identity>, JournalError> {
        match self.register(username, password).await {
            Ok(identity) => Ok(InsertResult::New(identity)),
            Err(JournalError::UsernameTaken) => {
                let db = self.db.read().await;
                let user = db.user_by_username(username).ok_or(JournalError::UserNotFound)?;
                Ok(InsertResult::Existing(Identity::from(user)))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<Identity>, JournalError> {
        let (identity, password_hash) = {
            let db = self.db.read().await;
            match db.user_by_username(username) {
                Some(user) => (Identity::from(user), user.password_hash.clone()),
                None => return Ok(None),
            }
        };
        let valid = auth::verify_password_blocking(password.to_string(), password_hash).await?;
        Ok(valid.then_some(identity))
    }

    pub async fn load_identity(&self, user_id: &UserId) -> Option<Identity> {
        self.db.read().await.user_by_id(user_id).map(Identity::from)
    }

    pub async fn overview(&self, identity: &Identity) -> Result<Overview, JournalError> {
        let db = self.db.read().await;
        let user = db.user_by_id(&identity.user_id).ok_or(JournalError::UserNotFound)?;
        Ok(Overview {
            entries: db.entries_for_owner(&identity.user_id),
            tags: user.tags.clone(),
        })
    }

    pub async fn entries_tagged(&self, identity: &Identity, tag: &str) -> Vec<Entry> {
        self.db.read().await.entries_for_owner_with_tag(&identity.user_id, tag)
    }

    pub async fn entry(&self, identity: &Identity, entry_id: &str) -> Result<Entry, JournalError> {
        let db = self.db.read().await;
        guard::owned(identity, db.entry_by_entry_id(entry_id).cloned())
    }

    pub async fn create_entry(&self, identity: &Identity, draft: EntryDraft) -> Result<Entry, JournalError> {
        let mut tx = self.db.begin().await;
        let entry_id = assign_entry_id(&draft.title, &*tx)?;
        let entry = Entry::new(identity.user_id, entry_id, draft);
        tx.insert_entry(entry.clone())?;
        reconcile_ledger(&mut tx, &identity.user_id, &entry.tags)?;
        tx.commit().await?;
        info!("{} created entry {:?}", identity.username, entry.entry_id);
        Ok(entry)
    }

    pub async fn edit_entry(&self, identity: &Identity, entry_id: &str, draft: EntryDraft) -> Result<Entry, JournalError> {
        let mut tx = self.db.begin().await;
        let mut entry = guard::owned(identity, tx.entry_by_entry_id(entry_id).cloned())?;
        entry.apply(draft);
        tx.update_entry(entry.clone())?;
        reconcile_ledger(&mut tx, &identity.user_id, &entry.tags)?;
        tx.commit().await?;
        info!("{} edited entry {:?}", identity.username, entry.entry_id);
        Ok(entry)
    }

    pub async fn delete_entry(&self, identity: &Identity, entry_id: &str) -> Result<Entry, JournalError> {
        let mut tx = self.db.begin().await;
        let entry = guard::owned(identity, tx.entry_by_entry_id(entry_id).cloned())?;
        tx.delete_entry(entry.id)?;
        reconcile_ledger(&mut tx, &identity.user_id, &TagList::new())?;
        tx.commit().await?;
        info!("{} deleted entry {:?}", identity.username, entry.entry_id);
        Ok(entry)
    }

    /// Rebuilds every user's ledger from their entries. Returns how many changed.
    pub async fn reconcile_all(&self) -> Result<usize, JournalError> {
        let mut tx = self.db.begin().await;
        let rebuilt = tx.users()
            .map(|user| (user.id, user.tags.clone(), ledger::rebuild(&tx.entries_for_owner(&user.id))))
            .filter(|(_, current, rebuilt)| current != rebuilt)
            .map(|(user_id, _, rebuilt)| (user_id, rebuilt))
            .collect::<Vec<_>>();
        let changed = rebuilt.len();
        for (user_id, tags) in rebuilt {
            tx.set_user_tags(user_id, tags)?;
        }
        tx.commit().await?;
        Ok(changed)
    }
}

fn reconcile_ledger<S: Storage>(tx: &mut Transaction<'_, S>, owner: &UserId, introduced: &TagList) -> Result<(), JournalError> {
    let current = tx.user_by_id(owner).ok_or(JournalError::UserNotFound)?.tags.clone();
    let reconciled = ledger::reconcile(&current, &tx.entries_for_owner(owner), introduced);
    if reconciled != current {
        tx.set_user_tags(*owner, reconciled)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crate::storage::InMemoryStorage;
    use super::*;

    async fn journal() -> Journal<InMemoryStorage> {
        Journal::new(Database::open(InMemoryStorage::default()).await.unwrap())
    }

    fn draft(title: &str, tags: &str) -> EntryDraft {
        EntryDraft {
            title: title.to_string(),
            tags: TagList::parse(tags),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time_spent: "3 hours".to_string(),
            learning: "lifetimes".to_string(),
            resources: "the nomicon".to_string(),
        }
    }

    async fn ledger_of(journal: &Journal<InMemoryStorage>, identity: &Identity) -> String {
        journal.overview(identity).await.unwrap().tags.to_string()
    }

    #[tokio::test]
    async fn test_register_login_and_tag_lifecycle() {
        let journal = journal().await;
        journal.register("josh", "123").await.unwrap();
        let josh = journal.authenticate("josh", "123").await.unwrap().unwrap();
        assert_eq!(josh.username, "josh");

        let entry = journal.create_entry(&josh, draft("Day 1", "#rust learning")).await.unwrap();
        assert_eq!(entry.entry_id, "Day 1");
        assert_eq!(entry.tags.to_string(), "#rust ");
        assert_eq!(ledger_of(&journal, &josh).await, "#rust ");

        journal.edit_entry(&josh, "Day 1", draft("Day 1", "learning")).await.unwrap();
        assert_eq!(ledger_of(&journal, &josh).await, "");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user() {
        let journal = journal().await;
        journal.register("josh", "123").await.unwrap();
        assert!(journal.authenticate("josh", "wrong").await.unwrap().is_none());
        assert!(journal.authenticate("nobody", "123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected() {
        let journal = journal().await;
        journal.register("josh", "123").await.unwrap();
        assert!(matches!(journal.register("josh", "456").await, Err(JournalError::UsernameTaken)));
        assert!(!journal.ensure_user("josh", "456").await.unwrap().is_new());
        assert!(journal.authenticate("josh", "123").await.unwrap().is_some());
        assert!(journal.ensure_user("ana", "456").await.unwrap().is_new());
    }

    #[tokio::test]
    async fn test_colliding_titles_get_suffixes() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        let ana = journal.register("ana", "123").await.unwrap();
        assert_eq!(journal.create_entry(&josh, draft("trip", "")).await.unwrap().entry_id, "trip");
        assert_eq!(journal.create_entry(&ana, draft("trip", "")).await.unwrap().entry_id, "trip1");
        assert_eq!(journal.create_entry(&josh, draft("trip", "")).await.unwrap().entry_id, "trip2");
    }

    #[tokio::test]
    async fn test_delete_prunes_only_orphaned_tags() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        journal.create_entry(&josh, draft("one", "#a")).await.unwrap();
        journal.create_entry(&josh, draft("two", "#b #a")).await.unwrap();
        assert_eq!(ledger_of(&journal, &josh).await, "#a #b ");

        journal.delete_entry(&josh, "two").await.unwrap();
        assert_eq!(ledger_of(&journal, &josh).await, "#a ");
        assert!(matches!(journal.entry(&josh, "two").await, Err(JournalError::NotFound)));
    }

    #[tokio::test]
    async fn test_ledgers_are_per_user() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        let ana = journal.register("ana", "123").await.unwrap();
        journal.create_entry(&josh, draft("mine", "#shared #josh")).await.unwrap();
        journal.create_entry(&ana, draft("hers", "#shared")).await.unwrap();
        journal.delete_entry(&josh, "mine").await.unwrap();

        assert_eq!(ledger_of(&journal, &josh).await, "");
        assert_eq!(ledger_of(&journal, &ana).await, "#shared ");
    }

    #[tokio::test]
    async fn test_foreign_entries_look_missing() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        let ana = journal.register("ana", "123").await.unwrap();
        journal.create_entry(&josh, draft("secret", "#a")).await.unwrap();

        let foreign = journal.entry(&ana, "secret").await.unwrap_err();
        let missing = journal.entry(&ana, "nothing").await.unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
        assert!(matches!(journal.edit_entry(&ana, "secret", draft("x", "")).await, Err(JournalError::NotFound)));
        assert!(matches!(journal.delete_entry(&ana, "secret").await, Err(JournalError::NotFound)));
        assert!(journal.entry(&josh, "secret").await.is_ok());
        assert!(journal.entries_tagged(&ana, "#a").await.is_empty());
    }

    #[tokio::test]
    async fn test_edit_keeps_slug_and_owner() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        let created = journal.create_entry(&josh, draft("trip", "#a")).await.unwrap();
        let edited = journal.edit_entry(&josh, "trip", draft("Renamed trip", "#b")).await.unwrap();
        assert_eq!(edited.entry_id, "trip");
        assert_eq!(edited.id, created.id);
        assert_eq!(edited.owner, josh.user_id);
        assert_eq!(edited.title, "Renamed trip");
        assert_eq!(ledger_of(&journal, &josh).await, "#b ");
    }

    #[tokio::test]
    async fn test_tag_queries() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        journal.create_entry(&josh, draft("ops", "#devops")).await.unwrap();
        journal.create_entry(&josh, draft("dev", "#dev")).await.unwrap();
        let dev = journal.entries_tagged(&josh, "#dev").await;
        assert_eq!(dev.len(), 1);
        assert_eq!(dev[0].entry_id, "dev");
    }

    #[tokio::test]
    async fn test_reconcile_all_heals_stale_ledgers() {
        let journal = journal().await;
        let josh = journal.register("josh", "123").await.unwrap();
        journal.create_entry(&josh, draft("one", "#a")).await.unwrap();
        {
            let mut tx = journal.database().begin().await;
            tx.set_user_tags(josh.user_id, TagList::parse("#stale")).unwrap();
            tx.commit().await.unwrap();
        }
        assert_eq!(journal.reconcile_all().await.unwrap(), 1);
        assert_eq!(ledger_of(&journal, &josh).await, "#a ");
        assert_eq!(journal.reconcile_all().await.unwrap(), 0);
    }
}

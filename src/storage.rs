use std::future::Future;
use std::path::{Path, PathBuf};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use crate::entities::{Entry, EntryKey, User, UserId};
use crate::error::JournalError;
use crate::tags::TagList;

pub const DB_FILE_NAME: &str = "journal.db.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DbOperation {
    CreateUser { user: User },
    SetUserTags { user_id: UserId, tags: TagList },
    CreateEntry { entry: Entry },
    UpdateEntry { entry: Entry },
    DeleteEntry { id: EntryKey },
}

impl DbOperation {
    pub fn name(&self) -> &'static str {
        match self {
            DbOperation::CreateUser { .. } => "CreateUser",
            DbOperation::SetUserTags { .. } => "SetUserTags",
            DbOperation::CreateEntry { .. } => "CreateEntry",
            DbOperation::UpdateEntry { .. } => "UpdateEntry",
            DbOperation::DeleteEntry { .. } => "DeleteEntry",
        }
    }
}

/// Everything one transaction changed. Stored as a single log line, so it
/// is either replayed completely or not at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commit {
    pub operations: Vec<DbOperation>,
}

pub trait Storage: Send + Sync + 'static {
    fn read_all(&self) -> impl Future<Output = Result<Vec<Commit>, JournalError>> + Send;
    fn write(&mut self, commit: &Commit) -> impl Future<Output = Result<(), JournalError>> + Send;
}

pub struct FileStorage {
    db_path: PathBuf,
}

impl FileStorage {
    /// Opens the log inside `workdir`, creating the directory and an empty log if needed.
    pub fn open(workdir: &Path) -> anyhow::Result<Self> {
        if !workdir.exists() {
            std::fs::create_dir_all(workdir)?;
        }
        if !workdir.is_dir() {
            anyhow::bail!("workdir is not a directory: {}", workdir.display());
        }
        let db_path = workdir.join(DB_FILE_NAME);
        if db_path.exists() && !db_path.is_file() {
            anyhow::bail!("db_path is not a file: {}", db_path.display());
        }
        if !db_path.exists() {
            std::fs::write(&db_path, "")?;
        }
        info!("db_path: {}", db_path.display());
        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Storage for FileStorage {
    async fn read_all(&self) -> Result<Vec<Commit>, JournalError> {
        let file_str = tokio::fs::read_to_string(&self.db_path).await
            .map_err(JournalError::DbIOError)?;
        let parsed = parse_log(&file_str)?;
        if parsed.valid_len < file_str.len() as u64 {
            warn!("truncating unfinished DB log tail: {} -> {} bytes", file_str.len(), parsed.valid_len);
            let file = tokio::fs::OpenOptions::new().write(true).open(&self.db_path).await
                .map_err(JournalError::DbIOError)?;
            file.set_len(parsed.valid_len).await
                .map_err(JournalError::DbIOError)?;
            file.sync_data().await
                .map_err(JournalError::DbIOError)?;
        }
        Ok(parsed.commits)
    }

    async fn write(&mut self, commit: &Commit) -> Result<(), JournalError> {
        let serialized_commit = serde_json::to_string(commit)
            .map_err(JournalError::DbSerializationError)?;
        let line = format!("{}\n", serialized_commit);
        let mut file = tokio::fs::OpenOptions::new().append(true).open(&self.db_path).await
            .map_err(JournalError::DbIOError)?;
        let start = file.metadata().await
            .map_err(JournalError::DbIOError)?
            .len();
        if let Err(err) = append_line(&mut file, line.as_bytes()).await {
            // a failed commit must not leave bytes behind for the next append
            if let Err(truncate_err) = rollback(&file, start).await {
                error!("failed to roll DB log back to {} bytes: {}", start, truncate_err);
            }
            return Err(JournalError::DbIOError(err));
        }
        Ok(())
    }
}

async fn append_line(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.sync_data().await
}

async fn rollback(file: &tokio::fs::File, len: u64) -> std::io::Result<()> {
    file.set_len(len).await?;
    file.sync_data().await
}

#[derive(Debug)]
struct ParsedLog {
    commits: Vec<Commit>,
    /// Byte length of the log up to and including the last complete line.
    valid_len: u64,
}

/// Parses the log. A final line without its newline is a write that never
/// finished and is dropped; any other bad line is an error.
fn parse_log(file_str: &str) -> Result<ParsedLog, JournalError> {
    let mut commits = Vec::new();
    let mut valid_len = 0;
    for (index, chunk) in file_str.split_inclusive('\n').enumerate() {
        let Some(line) = chunk.strip_suffix('\n') else {
            warn!("skipping unfinished DB log line {}", index + 1);
            break;
        };
        if !line.trim().is_empty() {
            let commit = serde_json::from_str::<Commit>(line)
                .map_err(|err| JournalError::CorruptLog { line: index + 1, source: err })?;
            commits.push(commit);
        }
        valid_len += chunk.len() as u64;
    }
    Ok(ParsedLog { commits, valid_len })
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    commits: Vec<Commit>,
}

impl InMemoryStorage {
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }
}

impl Storage for InMemoryStorage {
    async fn read_all(&self) -> Result<Vec<Commit>, JournalError> {
        Ok(self.commits.clone())
    }

    async fn write(&mut self, commit: &Commit) -> Result<(), JournalError> {
        self.commits.push(commit.clone());
        Ok(())
    }
}

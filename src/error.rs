use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Failed to read/write DB file: {0}")]
    DbIOError(std::io::Error),
    #[error("Failed to serialize/deserialize DB operation: {0}")]
    DbSerializationError(serde_json::Error),
    #[error("DB log is corrupt at line {line}: {source}")]
    CorruptLog { line: usize, source: serde_json::Error },
    #[error("User with that name already exists.")]
    UsernameTaken,
    #[error("Entry id is already taken: {0}")]
    EntryIdTaken(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Entry not found")]
    NotFound,
    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
    #[error("Blocking task failed: {0}")]
    BlockingTask(#[from] tokio::task::JoinError),
}

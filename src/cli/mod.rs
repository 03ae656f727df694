use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;
use crate::config::{Config, FlatConfig};
use crate::db::Database;
use crate::entities::InsertResult;
use crate::forms;
use crate::journal::Journal;
use crate::storage::FileStorage;
use crate::web_ui;

#[derive(Parser, Debug)]
#[command(version, about = "A personal learning journal")]
pub struct Cli {
    #[command(flatten)]
    pub config: FlatConfig,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the web server (default)
    Serve,
    /// Create an account
    AddUser {
        username: String,
        password: String,
    },
    /// Rebuild every user's tag list from their entries
    ReconcileTags,
    /// Replay the DB log and print what it holds
    Check,
}

pub async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let journal = open_journal(&config).await?;
    match command {
        Command::Serve => web_ui::serve(config, journal).await,
        Command::AddUser { username, password } => add_user(&journal, &username, &password).await,
        Command::ReconcileTags => reconcile_tags(&journal).await,
        Command::Check => check(&journal).await,
    }
}

async fn open_journal(config: &Config) -> anyhow::Result<Journal<FileStorage>> {
    let storage = FileStorage::open(&config.db.workdir)?;
    let db = Database::open(storage).await?;
    Ok(Journal::new(db))
}

async fn add_user(journal: &Journal<FileStorage>, username: &str, password: &str) -> anyhow::Result<()> {
    if let Err(message) = forms::validate_username(username) {
        anyhow::bail!("invalid username {:?}: {}", username, message);
    }
    if password.chars().count() < 2 {
        anyhow::bail!("password must be at least 2 characters long");
    }
    match journal.ensure_user(username, password).await? {
        InsertResult::Existing(identity) => {
            println!("{} {}", "User already exists:".yellow(), identity.username);
        }
        InsertResult::New(identity) => {
            println!("{} {} ({})", "User created:".green(), identity.username, identity.user_id);
        }
    }
    Ok(())
}

async fn reconcile_tags(journal: &Journal<FileStorage>) -> anyhow::Result<()> {
    let changed = journal.reconcile_all().await?;
    info!("reconciled tag lists, {} changed", changed);
    println!("{} {}", "Tag lists rebuilt:".green(), changed);
    Ok(())
}

async fn check(journal: &Journal<FileStorage>) -> anyhow::Result<()> {
    let db = journal.database().read().await;
    println!("{} {}", "Users:".bold(), db.user_count());
    println!("{} {}", "Entries:".bold(), db.entry_count());
    for user in db.users() {
        let entries = db.entries_for_owner(&user.id);
        println!("  {} {} entries, tags: {}", user.username.cyan(), entries.len(), user.tags);
    }
    Ok(())
}

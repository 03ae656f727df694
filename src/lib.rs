pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod forms;
pub mod guard;
pub mod identity;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod storage;
pub mod tags;
pub mod web_ui;

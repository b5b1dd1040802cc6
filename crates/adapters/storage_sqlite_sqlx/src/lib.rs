//! # chathub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the storage port traits defined in `chathub-app::ports`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run the embedded sqlx migrations
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `chathub-app` (for port traits) and `chathub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod automation_rule_repo;
mod error;
mod message_store;
mod pool;

pub use automation_rule_repo::SqliteAutomationRuleRepository;
pub use error::StorageError;
pub use message_store::SqliteMessageStore;
pub use pool::{Config, Database};

//! SQLite persistence.
//!
//! The local database plays the part of the remote store for the CLI: it
//! holds the authoritative task rows and the schema version history.
//!
//! ```rust,no_run
//! use tasklane::api::RemoteStore;
//! use tasklane::db::tasks::SqliteRemote;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let remote = SqliteRemote::new()?;
//! let rows = remote.read_tasks("local").await?;
//! # Ok(())
//! # }
//! ```

/// Connection setup; applies migrations on open.
pub mod db;

/// Versioned schema changes and their history.
pub mod migrations;

/// Task rows exposed through the `RemoteStore` trait.
pub mod tasks;

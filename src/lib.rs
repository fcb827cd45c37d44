//! # Tasklane
//!
//! A personal task organizer. Tasks are partitioned into sections (Big
//! Three, urgent, waiting, routine, completed and custom buckets), moved and
//! reordered optimistically, and reconciled against a remote store that may
//! also be changed by other sessions.
//!
//! ## Features
//!
//! - **Classification**: one precedence rule decides each task's section
//! - **Ordering**: stable per-section order with whole-section renumbering
//! - **Optimistic Writes**: local changes show at once, roll back on failure
//! - **Remote Sync**: notifications merged without clobbering pending changes
//! - **Drag Gestures**: a state machine that emits validated move commands
//! - **Backends**: SQLite file, PostgREST-style HTTP endpoint, in-memory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasklane::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod api;
pub mod commands;
pub mod db;
pub mod libs;

//! Core library modules.
//!
//! ## Layout
//!
//! - **Model**: [`task`], [`section`], [`error`]
//! - **Organization**: [`classifier`] decides where a task lives, [`board`]
//!   keeps the per-section views, [`ordering`] plans moves
//! - **Synchronization**: [`state`], [`mutator`] (optimistic writes),
//!   [`sync`] (merging remote changes), [`event`]
//! - **Interaction**: [`drag`] turns gestures into move commands, [`store`]
//!   ties everything together
//! - **Infrastructure**: [`config`], [`data_storage`], [`messages`], [`view`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tasklane::db::tasks::SqliteRemote;
//! use tasklane::libs::section::SectionId;
//! use tasklane::libs::store::{StoreOptions, TaskStore};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let store = TaskStore::new(SqliteRemote::new()?, StoreOptions::default());
//! store.load().await?;
//! for task in store.get_section(&SectionId::BigThree) {
//!     println!("{}", task.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod board;
pub mod classifier;
pub mod config;
pub mod data_storage;
pub mod drag;
pub mod error;
pub mod event;
pub mod messages;
pub mod mutator;
pub mod ordering;
pub mod section;
pub mod state;
pub mod store;
pub mod sync;
pub mod task;
pub mod view;

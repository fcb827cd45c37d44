//! Command-line interface.
//!
//! Every task command opens the configured backend, loads the user's tasks
//! into a [`TaskStore`](crate::libs::store::TaskStore), performs one
//! operation and waits for it to be persisted before printing the outcome.
//! Task ids can be abbreviated to any unique prefix.

pub mod backend;
pub mod init;
pub mod list;
pub mod move_task;
pub mod task;
pub mod watch;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Show the board or a single section")]
    List(list::ListArgs),
    #[command(about = "Create a task in the routine section")]
    Add(task::AddArgs),
    #[command(about = "Toggle a task's completed flag")]
    Done(task::IdArgs),
    #[command(about = "Toggle Big Three membership")]
    Important(task::IdArgs),
    #[command(about = "Toggle a task's urgent flag")]
    Urgent(task::IdArgs),
    #[command(about = "Toggle waiting on someone else")]
    Wait(task::IdArgs),
    #[command(about = "Edit title, deadline, amount or link")]
    Edit(task::EditArgs),
    #[command(about = "Move a task to another section")]
    Move(move_task::MoveArgs),
    #[command(about = "Change a task's position inside its section")]
    Reorder(move_task::ReorderArgs),
    #[command(about = "Delete a task")]
    Delete(task::IdArgs),
    #[command(about = "Follow remote changes and redraw the board")]
    Watch,
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::List(args) => list::cmd(args).await,
            Commands::Add(args) => task::add(args).await,
            Commands::Done(args) => task::toggle(args, task::Toggle::Complete).await,
            Commands::Important(args) => task::toggle(args, task::Toggle::Important).await,
            Commands::Urgent(args) => task::toggle(args, task::Toggle::Urgent).await,
            Commands::Wait(args) => task::toggle(args, task::Toggle::Waiting).await,
            Commands::Edit(args) => task::edit(args).await,
            Commands::Move(args) => move_task::move_cmd(args).await,
            Commands::Reorder(args) => move_task::reorder(args).await,
            Commands::Delete(args) => task::delete(args).await,
            Commands::Watch => watch::cmd().await,
        }
    }
}

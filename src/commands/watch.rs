//! Follows remote changes and redraws the board after each merge.

use super::backend::open_store;
use crate::api::StaticPreferences;
use crate::libs::event::StoreEvent;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_error, msg_info, msg_warning};
use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

pub async fn cmd() -> Result<()> {
    let (config, store) = open_store().await?;
    let preferences = config.display.as_ref().map(StaticPreferences::from).unwrap_or_default();

    let mut events = store.subscribe_to_store_changes();
    let sync = store.start_sync();
    msg_info!(Message::WatchStarted(store.remote().name().to_string()));
    View::board(&store.board(&preferences))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(StoreEvent::Merged(report)) => {
                    let changes = report.inserted.len() + report.updated.len() + report.removed.len();
                    msg_info!(Message::WatchMerged(changes), true);
                    View::board(&store.board(&preferences))?;
                }
                Ok(StoreEvent::Conflict(conflict)) => msg_warning!(Message::WatchConflict(conflict.to_string())),
                Ok(StoreEvent::SyncFailed(error)) => msg_error!(Message::SyncFailed(error.to_string())),
                Ok(StoreEvent::RolledBack { error, .. }) => msg_error!(Message::ChangeRolledBack(error.to_string())),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "store events lagged, redrawing");
                    View::board(&store.board(&preferences))?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    sync.stop();
    Ok(())
}

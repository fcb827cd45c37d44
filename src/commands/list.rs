use super::backend::open_store;
use crate::api::StaticPreferences;
use crate::libs::section::SectionId;
use crate::libs::view::View;
use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Show a single section (big_three, urgent, waiting, routine, weekly, inbox, completed, custom-*)
    #[arg(short, long)]
    section: Option<SectionId>,
}

pub async fn cmd(args: ListArgs) -> Result<()> {
    let (config, store) = open_store().await?;

    match args.section {
        Some(section) => View::section(&section, &store.get_section_view(&section)),
        None => {
            let preferences = config.display.as_ref().map(StaticPreferences::from).unwrap_or_default();
            View::board(&store.board(&preferences))
        }
    }
}

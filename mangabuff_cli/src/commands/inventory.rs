use anyhow::{Context as _, Result};
use clap::Args;
use mangabuff_lib::inventory::fetch_all_cards;
use mangabuff_lib::profile::write_json_atomic;

use super::Context;
use crate::output::{print_cards, OutputFormat};

#[derive(Args)]
pub struct InventoryArgs {
    /// Whose cards to download (defaults to the profile's own id)
    #[arg(long)]
    pub user_id: Option<i64>,
}

pub async fn run(args: &InventoryArgs, ctx: &Context, format: &OutputFormat) -> Result<()> {
    let profile = ctx.profile()?;
    let user_id = args
        .user_id
        .or_else(|| profile.user_id())
        .context("no user id: pass --user-id or store one with `login --id`")?;

    let session = ctx.session(&profile)?;
    let cards = fetch_all_cards(&session, user_id, &ctx.trade).await;
    let path = ctx.store.root().join(format!("{}.json", user_id));
    write_json_atomic(&path, &cards)?;

    print_cards(&cards, format);
    eprintln!("{} cards saved to {}", cards.len(), path.display());
    Ok(())
}

use anyhow::{bail, Context as _, Result};
use clap::Args;
use mangabuff_lib::inventory::fetch_all_cards;
use mangabuff_lib::profile::write_json_atomic;
use mangabuff_lib::target::{latest_card_file, load_target_card};
use mangabuff_lib::{send_trades_to_owners, DispatchOptions, OnlineOwnerPages, TargetCard};

use super::Context;
use crate::output::{print_stats, OutputFormat};

#[derive(Args)]
pub struct SendTradesArgs {
    /// Target card id (used together with --rank)
    #[arg(long)]
    pub card_id: Option<i64>,

    /// Target card name, enables the search endpoint
    #[arg(long, default_value = "")]
    pub card_name: String,

    /// Target card rank letter
    #[arg(long)]
    pub rank: Option<String>,

    /// Card file to read the target from (defaults to the newest card_*_from_*.json)
    #[arg(long)]
    pub card_file: Option<std::path::PathBuf>,

    /// Owner pages to walk, 0 for all
    #[arg(long, default_value = "0")]
    pub pages: u32,

    /// Actually submit offers instead of logging them
    #[arg(long)]
    pub live: bool,

    /// Skip the create-trade endpoint and use the offer form only
    #[arg(long)]
    pub no_api: bool,
}

impl SendTradesArgs {
    fn target(&self, ctx: &Context) -> Result<Option<TargetCard>> {
        if let (Some(card_id), Some(rank)) = (self.card_id, self.rank.as_deref()) {
            return Ok(Some(TargetCard {
                card_id,
                name: self.card_name.clone(),
                rank: rank.trim().to_string(),
            }));
        }
        let path = match &self.card_file {
            Some(path) => Some(path.clone()),
            None => latest_card_file(ctx.store.root()),
        };
        match path {
            Some(path) => Ok(Some(load_target_card(&path)?)),
            None => Ok(None),
        }
    }
}

pub async fn run(args: &SendTradesArgs, ctx: &Context, format: &OutputFormat) -> Result<()> {
    let profile = ctx.profile()?;
    let Some(target) = args.target(ctx)? else {
        eprintln!("No target card given and no card file found; nothing to send.");
        return Ok(());
    };
    let operator_id = profile.user_id();
    let my_id = operator_id.context("profile has no user id; run `login --id`")?;

    let session = ctx.session(&profile)?;
    let my_cards = fetch_all_cards(&session, my_id, &ctx.trade).await;
    if my_cards.is_empty() {
        bail!("own inventory is empty");
    }
    write_json_atomic(&ctx.store.root().join(format!("{}.json", my_id)), &my_cards)?;

    let mut owners = OnlineOwnerPages::new(
        &session,
        target.card_id,
        args.pages,
        ctx.trade.owner_page_delay,
    );
    let options = DispatchOptions {
        dry_run: !args.live,
        use_api: !args.no_api,
    };
    let stats = send_trades_to_owners(
        &session,
        &ctx.trade,
        operator_id,
        &target,
        &mut owners,
        &my_cards,
        options,
    )
    .await;

    print_stats(&stats, format);
    Ok(())
}

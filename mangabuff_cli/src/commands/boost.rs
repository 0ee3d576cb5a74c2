use anyhow::{Context as _, Result};
use clap::Args;
use mangabuff_lib::club::{find_boost_card, owners_and_wanters_counts};
use mangabuff_lib::profile::write_json_atomic;

use super::Context;
use crate::output::{print_boost, OutputFormat};

#[derive(Args)]
pub struct BoostArgs {
    /// Club boost page, absolute or relative to the site root
    #[arg(long)]
    pub url: String,
}

pub async fn run(args: &BoostArgs, ctx: &Context, format: &OutputFormat) -> Result<()> {
    let profile = ctx.profile()?;
    let session = ctx.session(&profile)?;

    let boost = find_boost_card(&session, &args.url, &ctx.trade)
        .await
        .context("could not resolve the club boost card")?;
    let path = ctx
        .store
        .root()
        .join(format!("card_{}_from_{}.json", boost.card_id, boost.owner_id));
    write_json_atomic(&path, &boost.card)?;

    let demand = owners_and_wanters_counts(&session, boost.card_id).await;
    print_boost(&boost, &demand, format);
    eprintln!("card file saved to {}", path.display());
    Ok(())
}

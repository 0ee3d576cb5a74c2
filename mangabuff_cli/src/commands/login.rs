use anyhow::Result;
use clap::Args;
use mangabuff_lib::auth::update_profile_cookies;
use mangabuff_lib::ProfileStore;

use super::Context;

#[derive(Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long)]
    pub password: String,

    /// Numeric user id, stored in a new profile
    #[arg(long)]
    pub id: Option<i64>,

    /// Club name, stored in a new profile
    #[arg(long)]
    pub club_name: Option<String>,

    /// Skip the post-login authentication check
    #[arg(long)]
    pub skip_check: bool,
}

pub async fn run(args: &LoginArgs, ctx: &Context) -> Result<()> {
    let mut profile = ctx.store.read(&ctx.name).unwrap_or_else(|| {
        let id = args.id.map(|id| id.to_string());
        ProfileStore::default_profile(id.as_deref(), args.club_name.as_deref())
    });
    ctx.store.write(&ctx.name, &profile)?;

    update_profile_cookies(
        &ctx.client,
        &mut profile,
        &args.email,
        &args.password,
        args.skip_check,
    )
    .await?;

    let path = ctx.store.write(&ctx.name, &profile)?;
    println!("{}: logged in, profile saved to {}", ctx.name, path.display());
    Ok(())
}

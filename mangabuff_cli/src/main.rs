mod commands;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mangabuff_lib::{ClientConfig, ProfileStore, TradeConfig};

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "mangabuff")]
#[command(about = "Card trading helper for MangaBuff")]
struct Cli {
    /// Directory holding profiles and saved card files
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Profile name (stored as <dir>/<name>.json)
    #[arg(long, default_value = "main", global = true)]
    name: String,

    /// Output format: table, json or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and refresh the profile's cookies
    Login(commands::login::LoginArgs),
    /// Download a user's tradeable cards
    Inventory(commands::inventory::InventoryArgs),
    /// Find the club boost card and save it as a card file
    Boost(commands::boost::BoostArgs),
    /// Offer trades to online owners of a card
    SendTrades(commands::send_trades::SendTradesArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mangabuff=info".parse()?),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "json" => OutputFormat::Json,
        "markdown" | "md" => OutputFormat::Markdown,
        _ => OutputFormat::Table,
    };

    let ctx = commands::Context {
        store: ProfileStore::new(&cli.dir)?,
        name: cli.name,
        client: ClientConfig::from_env(),
        trade: TradeConfig::from_env(),
    };

    match &cli.command {
        Commands::Login(args) => commands::login::run(args, &ctx).await?,
        Commands::Inventory(args) => commands::inventory::run(args, &ctx, &format).await?,
        Commands::Boost(args) => commands::boost::run(args, &ctx, &format).await?,
        Commands::SendTrades(args) => commands::send_trades::run(args, &ctx, &format).await?,
    }

    Ok(())
}

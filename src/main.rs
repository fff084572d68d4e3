use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

mod agg;
mod browse;
mod feed;
mod ingestion;
mod init;
mod store;
mod telemetry;
mod user;

#[derive(Parser)]
#[command(name = "rss-agg", about = "Personal RSS aggregator")]
struct Cli {
    #[arg(global = true, short, long)]
    dsn: Option<String>,
    /// Emit JSON envelopes to stdout; logs go to stderr
    #[arg(global = true, long, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Init(init::InitCmd),
    User(user::UserCmd),
    Feed(feed::FeedCmd),
    Browse(browse::BrowseCmd),
    /// Poll feeds forever, one per interval
    Agg(agg::AggCmd),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    telemetry::config::set_json_mode(cli.json);

    // initialize logging/tracing (stderr). Respect RUST_LOG and AGG_LOG_FORMAT
    telemetry::config::init_tracing();
    let dsn = cli
        .dsn
        .or_else(|| env::var("DATABASE_URL").ok())
        .context("Please provide --dsn or set DATABASE_URL in .env")?;

    let pool = init::connect(&dsn).await?;

    match cli.command {
        Commands::Init(args) => init::run(&pool, args).await?,
        Commands::User(args) => user::run(&pool, args).await?,
        Commands::Feed(args) => feed::run(&pool, args).await?,
        Commands::Browse(args) => browse::run(&pool, args).await?,
        Commands::Agg(args) => agg::run(&pool, args).await?,
    }

    Ok(())
}

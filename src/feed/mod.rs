use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use sqlx::PgPool;
use url::Url;

use crate::telemetry::{self};
use crate::telemetry::ops::feed::Phase as FeedPhase;
use crate::user;

mod db;
pub mod types;

/// agg feed add/ls/follow/unfollow/following
#[derive(Args)]
pub struct FeedCmd {
    #[command(subcommand)]
    pub cmd: FeedSub,
}

#[derive(Subcommand)]
pub enum FeedSub {
    // add a new feed and follow it (plan-only by default; use --apply to write)
    Add {
        url: String,
        /// Display name; defaults to the url's host
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = false)]
        apply: bool,
    },
    // list all feeds
    Ls,
    Follow {
        url: String,
        #[arg(long)]
        user: String,
    },
    Unfollow {
        url: String,
        #[arg(long)]
        user: String,
    },
    /// Feeds the user follows
    Following {
        #[arg(long)]
        user: String,
    },
}

pub async fn run(pool: &PgPool, args: FeedCmd) -> Result<()> {
    let log = telemetry::feed();
    let _g = log.root_span().entered();
    match args.cmd {
        FeedSub::Add { url, name, user, apply } => add_feed(pool, url, name, user, apply).await?,
        FeedSub::Ls => ls_feeds(pool).await?,
        FeedSub::Follow { url, user } => set_follow(pool, url, user, true).await?,
        FeedSub::Unfollow { url, user } => set_follow(pool, url, user, false).await?,
        FeedSub::Following { user } => ls_following(pool, user).await?,
    }
    Ok(())
}

/// Feeds must be absolute http(s) urls; anything else would only fail at poll time.
pub fn validate_feed_url(raw: &str) -> Result<Url> {
    let Ok(url) = Url::parse(raw.trim()) else { bail!("Invalid URL: {}", raw) };
    if !matches!(url.scheme(), "http" | "https") { bail!("Unsupported URL scheme {:?}: {}", url.scheme(), raw); }
    if url.host_str().is_none() { bail!("URL has no host: {}", raw); }
    Ok(url)
}

fn default_name(url: &Url) -> String {
    url.host_str().unwrap_or_default().trim_start_matches("www.").to_string()
}

async fn add_feed(pool: &PgPool, url: String, name: Option<String>, user: String, apply: bool) -> Result<()> {
    let log = telemetry::feed();
    let parsed = validate_feed_url(&url)?;
    let url = parsed.to_string();
    let name = name.unwrap_or_else(|| default_name(&parsed));
    let _g = log.root_span_kv([
        ("mode", if apply { "apply".to_string() } else { "plan".to_string() }),
        ("url", url.clone()),
        ("name", name.clone()),
        ("user", user.clone()),
    ]).entered();

    if !apply {
        let _s = log.span(&FeedPhase::Plan).entered();
        log.info(format!("📝 Feed plan — add url={} name={:?} user={}", url, name, user));
        log.info("   Use --apply to execute.");
        if telemetry::config::json_mode() {
            let plan = types::FeedAddPlan { action: "add", url, name, user };
            log.plan(&plan)?;
        }
        return Ok(());
    }

    let _s = log.span(&FeedPhase::Add).entered();
    let user_id = user::require_user(pool, &user).await?;
    let Some(feed_id) = db::create_feed(pool, &name, &url, user_id).await? else {
        bail!("feed already exists: {} (use `feed follow` instead)", url);
    };
    log.info(format!("➕ Feed added: {} ({})", name, url));
    log.info(format!("👀 {} now following {}", user, name));
    if telemetry::config::json_mode() {
        log.result(&types::FeedAddResult { feed_id, url, following: true })?;
    }
    Ok(())
}

async fn ls_feeds(pool: &PgPool) -> Result<()> {
    let log = telemetry::feed();
    let _s = log.span(&FeedPhase::List).entered();
    let feeds = db::list_feeds(pool).await?;
    log.info("📡 Feeds:");
    for row in &feeds {
        let fetched = row.last_fetched_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "never".to_string());
        log.info(format!("* {} {} owner={} last_fetched={}", row.name, row.url, row.owner, fetched));
    }
    if telemetry::config::json_mode() {
        log.result(&types::FeedList { feeds })?;
    }
    Ok(())
}

async fn set_follow(pool: &PgPool, url: String, user: String, follow: bool) -> Result<()> {
    let log = telemetry::feed();
    let _s = log.span_kv(&FeedPhase::Follow, [("url", url.clone()), ("follow", follow.to_string())]).entered();
    let url = validate_feed_url(&url)?.to_string();
    let user_id = user::require_user(pool, &user).await?;
    let Some(feed_id) = db::find_feed_id(pool, &url).await? else {
        bail!("no feed with url {}", url);
    };
    let changed = if follow {
        db::follow(pool, user_id, feed_id).await?
    } else {
        db::unfollow(pool, user_id, feed_id).await?
    };
    match (follow, changed) {
        (true, true) => log.info(format!("👀 {} now following {}", user, url)),
        (true, false) => log.info(format!("ℹ️  {} already follows {}", user, url)),
        (false, true) => log.info(format!("👋 {} unfollowed {}", user, url)),
        (false, false) => log.info(format!("ℹ️  {} was not following {}", user, url)),
    }
    if telemetry::config::json_mode() {
        log.result(&types::FollowResult { url, user, changed })?;
    }
    Ok(())
}

async fn ls_following(pool: &PgPool, user: String) -> Result<()> {
    let log = telemetry::feed();
    let _s = log.span(&FeedPhase::List).entered();
    let user_id = user::require_user(pool, &user).await?;
    let feeds = db::following(pool, user_id).await?;
    log.info(format!("📡 {} is following:", user));
    for row in &feeds { log.info(format!("* {} {}", row.name, row.url)); }
    if telemetry::config::json_mode() {
        log.result(&types::FeedList { feeds })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_feeds() {
        assert_eq!(validate_feed_url("https://blog.boot.dev/index.xml").unwrap().host_str(), Some("blog.boot.dev"));
        assert!(validate_feed_url(" http://example.test/rss ").is_ok());
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(validate_feed_url("blog.boot.dev/index.xml").is_err());
        assert!(validate_feed_url("ftp://example.test/feed").is_err());
        assert!(validate_feed_url("file:///etc/passwd").is_err());
        assert!(validate_feed_url("").is_err());
    }

    #[test]
    fn default_name_is_host_without_www() {
        let url = validate_feed_url("https://www.example.test/feed.xml").unwrap();
        assert_eq!(default_name(&url), "example.test");
    }
}

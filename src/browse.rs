use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::telemetry::{self};
use crate::telemetry::ops::browse::Phase as BrowsePhase;
use crate::user;

/// Newest posts from the feeds a user follows
#[derive(Args)]
pub struct BrowseCmd {
    #[arg(long)]
    pub user: String,
    #[arg(long, default_value_t = 2)]
    pub limit: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PostRow {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub feed_name: String,
}

#[derive(Serialize)]
struct BrowseResult {
    user: String,
    posts: Vec<PostRow>,
}

pub async fn run(pool: &PgPool, args: BrowseCmd) -> Result<()> {
    let log = telemetry::browse();
    let _g = log.root_span_kv([("user", args.user.clone()), ("limit", args.limit.to_string())]).entered();
    if args.limit < 1 { bail!("--limit must be at least 1"); }

    let user_id = { let _s = log.span(&BrowsePhase::Resolve).entered(); user::require_user(pool, &args.user).await? };
    let posts = { let _s = log.span(&BrowsePhase::Query).entered(); posts_for_user(pool, user_id, args.limit).await? };

    if posts.is_empty() {
        log.info(format!("ℹ️  No posts yet for {} — is `agg` running?", args.user));
    }
    for p in &posts {
        log.info(format!("📰 {} — {} ({})", p.published_at.format("%Y-%m-%d %H:%M"), p.title, p.feed_name));
        log.info(format!("   {}", p.url));
    }
    if telemetry::config::json_mode() {
        log.result(&BrowseResult { user: args.user, posts })?;
    }
    Ok(())
}

async fn posts_for_user(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<PostRow>> {
    let rows = sqlx::query_as::<_, PostRow>(
        r#"
        SELECT p.id, p.title, p.url, p.description, p.published_at, f.name AS feed_name
        FROM agg.posts p
        JOIN agg.feeds f ON f.id = p.feed_id
        JOIN agg.feed_follows ff ON ff.feed_id = p.feed_id
        WHERE ff.user_id = $1
        ORDER BY p.published_at DESC, p.id
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

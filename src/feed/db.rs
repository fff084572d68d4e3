use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use super::types::FeedListRow;

/// Creates the feed and its owner's follow in one transaction.
/// Returns `None` if a feed with this url already exists.
pub async fn create_feed(pool: &PgPool, name: &str, url: &str, user_id: Uuid) -> Result<Option<Uuid>> {
    let mut tx = pool.begin().await?;
    let feed_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO agg.feeds (id, name, url, user_id, created_at, updated_at, last_fetched_at)
        VALUES ($1, $2, $3, $4, now(), now(), NULL)
        ON CONFLICT (url) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(url)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(feed_id) = feed_id else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        r#"
        INSERT INTO agg.feed_follows (id, user_id, feed_id, created_at, updated_at)
        VALUES ($1, $2, $3, now(), now())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(feed_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(feed_id))
}

pub async fn list_feeds(pool: &PgPool) -> Result<Vec<FeedListRow>> {
    let rows = sqlx::query_as::<_, FeedListRow>(
        r#"
        SELECT f.id, f.name, f.url, u.name AS owner, f.last_fetched_at
        FROM agg.feeds f
        JOIN agg.users u ON u.id = f.user_id
        ORDER BY f.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_feed_id(pool: &PgPool, url: &str) -> Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM agg.feeds WHERE url = $1")
        .bind(url)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

/// Returns false when the user already follows the feed.
pub async fn follow(pool: &PgPool, user_id: Uuid, feed_id: Uuid) -> Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO agg.feed_follows (id, user_id, feed_id, created_at, updated_at)
        VALUES ($1, $2, $3, now(), now())
        ON CONFLICT (user_id, feed_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(feed_id)
    .execute(pool)
    .await?;
    Ok(res.rows_affected() == 1)
}

pub async fn unfollow(pool: &PgPool, user_id: Uuid, feed_id: Uuid) -> Result<bool> {
    let res = sqlx::query("DELETE FROM agg.feed_follows WHERE user_id = $1 AND feed_id = $2")
        .bind(user_id)
        .bind(feed_id)
        .execute(pool)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn following(pool: &PgPool, user_id: Uuid) -> Result<Vec<FeedListRow>> {
    let rows = sqlx::query_as::<_, FeedListRow>(
        r#"
        SELECT f.id, f.name, f.url, u.name AS owner, f.last_fetched_at
        FROM agg.feed_follows ff
        JOIN agg.feeds f ON f.id = ff.feed_id
        JOIN agg.users u ON u.id = f.user_id
        WHERE ff.user_id = $1
        ORDER BY f.name
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Feed, FeedDirectory, InsertOutcome, NewPost, PostStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedDirectory for PgStore {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM agg.feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    async fn mark_fetched(&self, feed_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE agg.feeds
            SET last_fetched_at = $2, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(feed_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::FeedNotFound(feed_id));
        }
        Ok(())
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError> {
        // a conflict on url means the item came in on an earlier poll; never overwrite it
        let res = sqlx::query(
            r#"
            INSERT INTO agg.posts (id, title, url, description, published_at, feed_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, now(), now())
            ON CONFLICT (url) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&post.title)
        .bind(&post.url)
        .bind(post.description.as_deref())
        .bind(post.published_at)
        .bind(post.feed_id)
        .execute(&self.pool)
        .await?;
        if res.rows_affected() == 1 { Ok(InsertOutcome::Created) } else { Ok(InsertOutcome::Duplicate) }
    }
}

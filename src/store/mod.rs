//! Persistence collaborators consumed by the poll loop.
//!
//! The loop only ever needs two things from storage: pick the stalest feed and
//! stamp it, and insert a post keyed by its link. Everything else (users,
//! follows, listing) lives in the CLI modules and talks to Postgres directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

mod pg;
#[cfg(test)]
pub mod memory;

pub use pg::PgStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// A post ready to be written; id and bookkeeping timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// A post with the same link already exists.
    Duplicate,
}

#[derive(Debug)]
pub enum StoreError {
    FeedNotFound(Uuid),
    Database(sqlx::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::FeedNotFound(id) => write!(f, "feed {id} not found"),
            StoreError::Database(err) => write!(f, "database error: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(err) => Some(err),
            StoreError::FeedNotFound(_) => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait FeedDirectory: Send + Sync {
    /// Feed with the oldest `last_fetched_at`, never-fetched feeds first.
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError>;

    /// Sets `last_fetched_at` and `updated_at` to `now`.
    async fn mark_fetched(&self, feed_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError>;
}

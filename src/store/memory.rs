use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Feed, FeedDirectory, InsertOutcome, NewPost, PostStore, StoreError};

/// In-process stand-in for `PgStore` with the same ordering and uniqueness rules.
#[derive(Debug, Default)]
pub struct MemoryStore {
    feeds: Mutex<Vec<Feed>>,
    posts: Mutex<Vec<NewPost>>,
    broken_links: Mutex<Vec<String>>,
    selection_broken: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_feed(&self, name: &str, url: &str, last_fetched_at: Option<DateTime<Utc>>) -> Feed {
        let mut feeds = self.feeds.lock().unwrap();
        // keep creation order strict so ties on last_fetched_at are deterministic
        let mut now = Utc::now();
        if let Some(last) = feeds.last() {
            if now <= last.created_at {
                now = last.created_at + chrono::Duration::microseconds(1);
            }
        }
        let feed = Feed {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: url.to_string(),
            user_id: Uuid::nil(),
            created_at: now,
            updated_at: now,
            last_fetched_at,
        };
        feeds.push(feed.clone());
        feed
    }

    pub fn feed(&self, id: Uuid) -> Option<Feed> {
        self.feeds.lock().unwrap().iter().find(|f| f.id == id).cloned()
    }

    pub fn posts(&self) -> Vec<NewPost> {
        self.posts.lock().unwrap().clone()
    }

    /// Inserts for this link fail with a database error.
    pub fn break_link(&self, link: &str) {
        self.broken_links.lock().unwrap().push(link.to_string());
    }

    pub fn break_selection(&self) {
        *self.selection_broken.lock().unwrap() = true;
    }
}

#[async_trait]
impl FeedDirectory for MemoryStore {
    async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        if *self.selection_broken.lock().unwrap() {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let feeds = self.feeds.lock().unwrap();
        // None sorts before Some(_), matching NULLS FIRST
        let next = feeds
            .iter()
            .min_by(|a, b| {
                a.last_fetched_at
                    .cmp(&b.last_fetched_at)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            })
            .cloned();
        Ok(next)
    }

    async fn mark_fetched(&self, feed_id: Uuid, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut feeds = self.feeds.lock().unwrap();
        let feed = feeds.iter_mut().find(|f| f.id == feed_id).ok_or(StoreError::FeedNotFound(feed_id))?;
        feed.last_fetched_at = Some(now);
        feed.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn insert_post(&self, post: &NewPost) -> Result<InsertOutcome, StoreError> {
        if self.broken_links.lock().unwrap().iter().any(|l| l == &post.url) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut posts = self.posts.lock().unwrap();
        if posts.iter().any(|p| p.url == post.url) {
            return Ok(InsertOutcome::Duplicate);
        }
        posts.push(post.clone());
        Ok(InsertOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn never_fetched_feed_wins_regardless_of_insert_order() {
        let store = MemoryStore::new();
        let old = store.add_feed("old", "https://old.test/rss", Some(Utc::now() - Duration::minutes(10)));
        let fresh = store.add_feed("fresh", "https://fresh.test/rss", None);

        let next = store.next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, fresh.id);

        store.mark_fetched(fresh.id, Utc::now()).await.unwrap();
        let next = store.next_feed_to_fetch().await.unwrap().unwrap();
        assert_eq!(next.id, old.id);
    }

    #[tokio::test]
    async fn mark_fetched_unknown_feed_is_not_found() {
        let store = MemoryStore::new();
        let err = store.mark_fetched(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, StoreError::FeedNotFound(_)));
    }
}

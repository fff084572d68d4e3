use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize)]
pub struct FeedAddPlan {
    pub action: &'static str,
    pub url: String,
    pub name: String,
    pub user: String,
}

#[derive(Serialize)]
pub struct FeedAddResult {
    pub feed_id: Uuid,
    pub url: String,
    pub following: bool,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct FeedListRow {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub owner: String,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct FeedList {
    pub feeds: Vec<FeedListRow>,
}

#[derive(Serialize)]
pub struct FollowResult {
    pub url: String,
    pub user: String,
    pub changed: bool,
}

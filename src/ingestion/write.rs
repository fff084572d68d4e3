use crate::store::{Feed, InsertOutcome, NewPost, PostStore, StoreError};
use crate::telemetry::{self};

use super::published::parse_published_at;
use super::types::{FeedDocument, FeedItem, IngestReport};

/// A store failure other than a duplicate link stopped the write part-way.
#[derive(Debug)]
pub struct WriteAborted {
    pub report: IngestReport,
    pub item: String,
    pub source: StoreError,
}

impl std::fmt::Display for WriteAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "insert of {} failed after {} new post(s): {}", self.item, self.report.created, self.source)
    }
}

impl std::error::Error for WriteAborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Writes every item of `doc` as a post of `feed`, in document order.
///
/// Items whose date or link is unusable are recorded as failures and skipped.
/// Links that already exist count as duplicates. Any other store error stops
/// the remaining items.
pub async fn ingest<P>(posts: &P, feed: &Feed, doc: &FeedDocument) -> Result<IngestReport, WriteAborted>
where
    P: PostStore + ?Sized,
{
    let log = telemetry::agg();
    let mut report = IngestReport::default();

    for item in &doc.items {
        let post = match to_post(feed, item) {
            Ok(post) => post,
            Err(reason) => {
                let label = item_label(item);
                log.warn_kv("⚠️ item skipped", [("item", label.clone()), ("reason", reason.clone())]);
                report.fail(label, reason);
                continue;
            }
        };

        match posts.insert_post(&post).await {
            Ok(InsertOutcome::Created) => {
                report.created += 1;
                log.post_added(&post.title, &feed.name);
            }
            Ok(InsertOutcome::Duplicate) => {
                report.duplicates += 1;
                log.debug(format!("↩️ already ingested: {}", post.url));
            }
            Err(source) => return Err(WriteAborted { report, item: post.url, source }),
        }
    }

    Ok(report)
}

fn to_post(feed: &Feed, item: &FeedItem) -> Result<NewPost, String> {
    let url = match item.link.as_deref() {
        Some(link) if !link.is_empty() => link.to_string(),
        _ => return Err("missing link".to_string()),
    };
    let raw_date = item.pub_date.as_deref().unwrap_or("");
    let published_at = parse_published_at(raw_date).map_err(|e| e.to_string())?;
    Ok(NewPost {
        feed_id: feed.id,
        title: item.title.clone().unwrap_or_default(),
        url,
        description: item.description.clone(),
        published_at,
    })
}

fn item_label(item: &FeedItem) -> String {
    item.link
        .clone()
        .filter(|l| !l.is_empty())
        .or_else(|| item.title.clone())
        .unwrap_or_else(|| "<untitled>".to_string())
}

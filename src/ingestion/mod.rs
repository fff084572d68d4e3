use chrono::Utc;
use tracing::Instrument;

use crate::store::{Feed, FeedDirectory, PostStore, StoreError};
use crate::telemetry::{self};
use crate::telemetry::ops::agg::Phase as AggPhase;

pub mod fetch;
pub mod parse;
pub mod published;
pub mod types;
mod write;

pub use fetch::{FeedSource, FetchError, HttpFeedSource, DEFAULT_FETCH_TIMEOUT};
pub use types::IngestReport;
pub use write::{ingest, WriteAborted};

#[derive(Debug)]
pub enum PollError {
    Stamp(StoreError),
    Fetch(FetchError),
    Write(WriteAborted),
}

impl std::fmt::Display for PollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Stamp(err) => write!(f, "could not mark feed fetched: {err}"),
            PollError::Fetch(err) => write!(f, "fetch failed: {err}"),
            PollError::Write(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Stamp(err) => Some(err),
            PollError::Fetch(err) => Some(err),
            PollError::Write(err) => Some(err),
        }
    }
}

/// One full poll of `feed`: stamp, fetch, write.
///
/// The stamp comes first and is not rolled back, so a feed that keeps failing
/// still moves to the back of the rotation.
pub async fn poll_feed(
    feeds: &dyn FeedDirectory,
    posts: &dyn PostStore,
    source: &dyn FeedSource,
    feed: &Feed,
) -> Result<IngestReport, PollError> {
    let log = telemetry::agg();

    feeds
        .mark_fetched(feed.id, Utc::now())
        .instrument(log.span(&AggPhase::Stamp))
        .await
        .map_err(PollError::Stamp)?;

    let doc = source
        .fetch(&feed.url)
        .instrument(log.span_kv(&AggPhase::Fetch, [("url", feed.url.clone())]))
        .await
        .map_err(PollError::Fetch)?;
    log.debug(format!("📥 {} item(s) from {:?}", doc.items.len(), doc.channel.title));

    ingest(posts, feed, &doc)
        .instrument(log.span(&AggPhase::Write))
        .await
        .map_err(PollError::Write)
}

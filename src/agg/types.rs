use serde::Serialize;
use uuid::Uuid;

use crate::ingestion::{IngestReport, PollError};
use crate::store::{Feed, StoreError};

#[derive(Debug)]
pub enum SelectionError {
    NoFeeds,
    Store(StoreError),
}

impl std::fmt::Display for SelectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionError::NoFeeds => write!(f, "no feeds to fetch"),
            SelectionError::Store(err) => write!(f, "failed to get next feed to fetch: {err}"),
        }
    }
}

impl std::error::Error for SelectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SelectionError::Store(err) => Some(err),
            SelectionError::NoFeeds => None,
        }
    }
}

/// What one tick of the poll loop did.
#[derive(Debug)]
pub enum TickOutcome {
    Polled { feed: Feed, report: IngestReport },
    /// Nothing was selected; the loop waits for the next tick.
    Idle(SelectionError),
    Failed { feed: Feed, error: PollError },
}

impl TickOutcome {
    /// Level the tick is logged at. Anything short of a polled feed is at least a warning.
    pub fn level(&self) -> tracing::Level {
        match self {
            TickOutcome::Polled { .. } => tracing::Level::INFO,
            TickOutcome::Idle(SelectionError::NoFeeds) | TickOutcome::Failed { .. } => tracing::Level::WARN,
            TickOutcome::Idle(SelectionError::Store(_)) => tracing::Level::ERROR,
        }
    }
}

// JSON envelope payload for one tick
#[derive(Debug, Serialize)]
pub struct TickSummary {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TickOutcome> for TickSummary {
    fn from(outcome: &TickOutcome) -> Self {
        match outcome {
            TickOutcome::Polled { feed, report } => TickSummary {
                outcome: "polled",
                feed_id: Some(feed.id),
                feed: Some(feed.name.clone()),
                report: Some(report.clone()),
                error: None,
            },
            TickOutcome::Idle(err) => TickSummary {
                outcome: "idle",
                feed_id: None,
                feed: None,
                report: None,
                error: Some(err.to_string()),
            },
            TickOutcome::Failed { feed, error } => TickSummary {
                outcome: "failed",
                feed_id: Some(feed.id),
                feed: Some(feed.name.clone()),
                // a write that stopped part-way still created posts worth reporting
                report: match error {
                    PollError::Write(aborted) => Some(aborted.report.clone()),
                    _ => None,
                },
                error: Some(error.to_string()),
            },
        }
    }
}

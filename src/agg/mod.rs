use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use sqlx::PgPool;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Level};

use crate::ingestion::{self, FeedSource, HttpFeedSource, PollError, DEFAULT_FETCH_TIMEOUT};
use crate::store::{FeedDirectory, PgStore, PostStore};
use crate::telemetry::{self};
use crate::telemetry::ops::agg::Phase as AggPhase;

pub mod config;
pub mod types;

use types::{SelectionError, TickOutcome, TickSummary};

/// Poll one feed per interval until Ctrl-C
#[derive(Args)]
pub struct AggCmd {
    /// Time between polls, e.g. 30s, 1m, 1h30m
    pub time_between_reqs: String,
    /// Upper bound on a single feed request [default: 5s]
    #[arg(long)]
    pub fetch_timeout: Option<String>,
}

pub async fn run(pool: &PgPool, args: AggCmd) -> Result<()> {
    let log = telemetry::agg();
    let _g = log.root_span_kv([
        ("time_between_reqs", args.time_between_reqs.clone()),
        ("fetch_timeout", format!("{:?}", args.fetch_timeout)),
    ]).entered();

    let interval = config::parse_positive_duration("time between requests", &args.time_between_reqs)?;
    let timeout = match args.fetch_timeout.as_deref() {
        Some(raw) => config::parse_positive_duration("fetch timeout", raw)?,
        None => DEFAULT_FETCH_TIMEOUT,
    };

    let store = Arc::new(PgStore::new(pool.clone()));
    let source = Arc::new(HttpFeedSource::new(timeout)?);
    let scheduler = Scheduler::new(store.clone(), store, source, interval);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), shutdown.clone()));

    log.info(format!("⏱️ Collecting feeds every {}", humantime::format_duration(interval)));
    let ticks = scheduler.run(shutdown).await;
    log.info(format!("🛑 Stopped after {} tick(s)", ticks));
    Ok(())
}

/// Cancels `shutdown` once `signal` resolves. A signal handler that cannot be
/// installed is logged and leaves the loop running.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => shutdown.cancel(),
        Err(err) => telemetry::agg().warn(format!("⚠️ Ctrl-C handler unavailable, stop the process another way: {err}")),
    }
}

/// Polls exactly one feed per tick, stalest first, never two at once.
pub struct Scheduler {
    feeds: Arc<dyn FeedDirectory>,
    posts: Arc<dyn PostStore>,
    source: Arc<dyn FeedSource>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        feeds: Arc<dyn FeedDirectory>,
        posts: Arc<dyn PostStore>,
        source: Arc<dyn FeedSource>,
        interval: Duration,
    ) -> Self {
        Self { feeds, posts, source, interval }
    }

    /// Runs ticks until `shutdown` is cancelled and returns how many ran.
    ///
    /// The first tick fires immediately. A poll that outlasts the interval
    /// swallows the ticks it missed instead of bunching them up.
    pub async fn run(&self, shutdown: CancellationToken) -> usize {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut ticks = 0usize;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {
                    let outcome = self.tick().await;
                    report(&outcome);
                    ticks += 1;
                }
            }
        }
        ticks
    }

    pub async fn tick(&self) -> TickOutcome {
        let log = telemetry::agg();
        let span = log.span(&AggPhase::Tick);
        async {
            let feed = match self.feeds.next_feed_to_fetch().instrument(log.span(&AggPhase::Select)).await {
                Ok(Some(feed)) => feed,
                Ok(None) => return TickOutcome::Idle(SelectionError::NoFeeds),
                Err(err) => return TickOutcome::Idle(SelectionError::Store(err)),
            };
            log.info_kv("📡 polling", [("feed", feed.name.clone()), ("url", feed.url.clone())]);

            match ingestion::poll_feed(self.feeds.as_ref(), self.posts.as_ref(), self.source.as_ref(), &feed).await {
                Ok(report) => TickOutcome::Polled { feed, report },
                Err(error) => TickOutcome::Failed { feed, error },
            }
        }
        .instrument(span)
        .await
    }
}

fn report(outcome: &TickOutcome) {
    let log = telemetry::agg();
    match outcome {
        TickOutcome::Polled { feed, report } => {
            log.feed_summary(&feed.name, report.created, report.duplicates, report.failed);
        }
        TickOutcome::Idle(err) => match outcome.level() {
            Level::ERROR => log.error(format!("❌ {}", err)),
            _ => log.warn(format!("💤 {}; waiting for next tick", err)),
        },
        TickOutcome::Failed { feed, error } => {
            if let PollError::Write(aborted) = error {
                log.feed_summary(&feed.name, aborted.report.created, aborted.report.duplicates, aborted.report.failed);
            }
            log.warn_kv("❌ poll failed", [("feed", feed.name.clone()), ("url", feed.url.clone()), ("error", error.to_string())]);
        }
    }
    if telemetry::config::json_mode() {
        if let Err(err) = log.result(&TickSummary::from(outcome)) {
            log.warn(format!("could not write tick envelope: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::ingestion::FetchError;

    use crate::ingestion::testing::StubSource;
    use crate::ingestion::types::{FeedDocument, FeedItem};
    use crate::store::memory::MemoryStore;

    fn doc(links: &[&str]) -> FeedDocument {
        let items = links
            .iter()
            .map(|l| FeedItem {
                title: Some(l.to_string()),
                link: Some(l.to_string()),
                description: None,
                pub_date: Some("Mon, 02 Jan 2006 15:04:05 -0700".to_string()),
            })
            .collect();
        FeedDocument { items, ..Default::default() }
    }

    fn scheduler(store: &Arc<MemoryStore>, source: &Arc<StubSource>, every: Duration) -> Scheduler {
        Scheduler::new(store.clone(), store.clone(), source.clone(), every)
    }

    #[tokio::test]
    async fn tick_prefers_never_polled_feed() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::new());
        let polled = store.add_feed("polled", "https://polled.test/rss", Some(Utc::now() - ChronoDuration::minutes(10)));
        let fresh = store.add_feed("fresh", "https://fresh.test/rss", None);
        source.serve(&polled.url, doc(&["p1"]));
        source.serve(&fresh.url, doc(&["f1", "f2"]));

        let outcome = scheduler(&store, &source, Duration::from_secs(60)).tick().await;
        match outcome {
            TickOutcome::Polled { feed, report } => {
                assert_eq!(feed.id, fresh.id);
                assert_eq!(report.created, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(source.calls(), [fresh.url.clone()]);
    }

    #[tokio::test]
    async fn tick_without_feeds_is_idle() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::new());

        let outcome = scheduler(&store, &source, Duration::from_secs(60)).tick().await;
        assert!(matches!(outcome, TickOutcome::Idle(SelectionError::NoFeeds)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn selection_store_error_is_contained() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::new());
        store.add_feed("blog", "https://blog.test/rss", None);
        store.break_selection();

        let outcome = scheduler(&store, &source, Duration::from_secs(60)).tick().await;
        assert!(matches!(outcome, TickOutcome::Idle(SelectionError::Store(_))));
    }

    #[tokio::test]
    async fn failing_feed_rotates_behind_healthy_ones() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(StubSource::new());
        let broken = store.add_feed("broken", "https://broken.test/rss", None);
        let healthy = store.add_feed("healthy", "https://healthy.test/rss", None);
        source.serve(&healthy.url, doc(&["h1"]));

        let s = scheduler(&store, &source, Duration::from_secs(60));
        let first = s.tick().await;
        assert!(matches!(first, TickOutcome::Failed { ref feed, .. } if feed.id == broken.id));
        let second = s.tick().await;
        assert!(matches!(second, TickOutcome::Polled { ref feed, .. } if feed.id == healthy.id));
        let third = s.tick().await;
        assert!(matches!(third, TickOutcome::Failed { ref feed, .. } if feed.id == broken.id));
    }

    #[tokio::test]
    async fn run_polls_one_feed_per_tick_until_cancelled() {
        let store = Arc::new(MemoryStore::new());
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();
        let mut stub = StubSource::new();
        stub.on_fetch = Some(Box::new(move |n: usize| if n == 3 { stop.cancel() }));
        let source = Arc::new(stub);

        let a = store.add_feed("a", "https://a.test/rss", None);
        let b = store.add_feed("b", "https://b.test/rss", None);
        source.serve(&a.url, doc(&["a1"]));
        source.serve(&b.url, doc(&["b1"]));

        let ticks = scheduler(&store, &source, Duration::from_millis(10)).run(shutdown).await;

        assert_eq!(ticks, 3);
        let calls = source.calls();
        assert_eq!(calls.len(), 3);
        // both feeds were visited before either was polled twice
        assert_ne!(calls[0], calls[1]);
        assert_eq!(calls[2], calls[0]);
        assert_eq!(store.posts().len(), 2);
    }

    /// Takes `delay` per fetch and records when each fetch ran.
    struct SlowSource {
        delay: Duration,
        doc: FeedDocument,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        runs: Mutex<Vec<(Instant, Instant)>>,
        stop_after: usize,
        stop: CancellationToken,
    }

    #[async_trait]
    impl FeedSource for SlowSource {
        async fn fetch(&self, _url: &str) -> Result<FeedDocument, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let started = Instant::now();
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut runs = self.runs.lock().unwrap();
            runs.push((started, Instant::now()));
            if runs.len() == self.stop_after {
                self.stop.cancel();
            }
            Ok(self.doc.clone())
        }
    }

    #[tokio::test]
    async fn slow_polls_skip_missed_ticks_instead_of_overlapping() {
        let every = Duration::from_millis(100);
        let store = Arc::new(MemoryStore::new());
        store.add_feed("a", "https://a.test/rss", None);
        store.add_feed("b", "https://b.test/rss", None);
        let shutdown = CancellationToken::new();
        let source = Arc::new(SlowSource {
            delay: Duration::from_millis(150),
            doc: doc(&["x1"]),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            runs: Mutex::new(Vec::new()),
            stop_after: 3,
            stop: shutdown.clone(),
        });

        let s = Scheduler::new(store.clone(), store.clone(), source.clone(), every);
        let ticks = s.run(shutdown).await;

        assert_eq!(ticks, 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
        let runs = source.runs.lock().unwrap();
        for pair in runs.windows(2) {
            let (prev_start, prev_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start >= prev_end, "polls overlapped");
            // a 150ms poll on a 100ms grid lands the next tick at 200ms, not right after
            assert!(
                next_start - prev_start >= Duration::from_millis(180),
                "missed tick ran back to back: {:?}",
                next_start - prev_start
            );
        }
    }

    #[tokio::test]
    async fn signal_cancels_shutdown() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn failed_signal_handler_leaves_loop_running() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(async { Err(std::io::Error::other("no signal driver")) }, shutdown.clone()).await;
        assert!(!shutdown.is_cancelled());
    }

    #[test]
    fn only_polled_ticks_report_below_warn() {
        let store = MemoryStore::new();
        let feed = store.add_feed("blog", "https://blog.test/rss", None);
        let polled = TickOutcome::Polled { feed: feed.clone(), report: Default::default() };
        assert_eq!(polled.level(), Level::INFO);
        assert_eq!(TickOutcome::Idle(SelectionError::NoFeeds).level(), Level::WARN);
        let failed = TickOutcome::Failed { feed, error: PollError::Fetch(FetchError::Timeout) };
        assert_eq!(failed.level(), Level::WARN);
        let broken = TickOutcome::Idle(SelectionError::Store(crate::store::StoreError::Database(sqlx::Error::PoolTimedOut)));
        assert_eq!(broken.level(), Level::ERROR);
    }

    #[test]
    fn tick_summaries_serialize_outcome_and_error() {
        let store = MemoryStore::new();
        let feed = store.add_feed("blog", "https://blog.test/rss", None);
        let outcome = TickOutcome::Idle(SelectionError::NoFeeds);
        let summary = TickSummary::from(&outcome);
        assert_eq!(summary.outcome, "idle");
        assert_eq!(summary.error.as_deref(), Some("no feeds to fetch"));

        let outcome = TickOutcome::Failed {
            feed: feed.clone(),
            error: PollError::Fetch(FetchError::Timeout),
        };
        let value = serde_json::to_value(TickSummary::from(&outcome)).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["feed"], "blog");
        assert_eq!(value["error"], "fetch failed: request timed out");
        assert!(value.get("report").is_none());
    }
}

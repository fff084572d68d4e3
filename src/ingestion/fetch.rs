use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::parse;
use super::types::FeedDocument;

pub const USER_AGENT: &str = concat!("rss-agg/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError>;
}

/// Fetches RSS over HTTP with a fixed user agent and a total request timeout.
#[derive(Clone)]
pub struct HttpFeedSource {
    http: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::from_reqwest)?;
        Ok(Self { http })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<FeedDocument, FetchError> {
        let response = self.http.get(url).send().await.map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.bytes().await.map_err(FetchError::from_reqwest)?;
        parse::parse_document(&body).map_err(FetchError::Decode)
    }
}

#[derive(Debug)]
pub enum FetchError {
    Timeout,
    Request(reqwest::Error),
    Status(StatusCode),
    Decode(rss::Error),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(err)
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Request(err) => write!(f, "http error: {err}"),
            FetchError::Status(status) => write!(f, "unexpected status {status}"),
            FetchError::Decode(err) => write!(f, "decode error: {err}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Request(err) => Some(err),
            FetchError::Decode(err) => Some(err),
            FetchError::Timeout | FetchError::Status(_) => None,
        }
    }
}

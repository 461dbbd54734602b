//! GitHub REST notification source.
//!
//! Talks to the `/notifications` endpoints of the GitHub REST API (or any
//! server exposing the same shape, see `api_base` in the settings).  Parsing
//! and status classification are pure functions so that tests can exercise
//! them without the network.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::{Notification, NotificationSource};
use crate::config::PollConfig;
use crate::error::FetchError;

const API_VERSION: &str = "2022-11-28";
const MEDIA_TYPE: &str = "application/vnd.github+json";
const PER_PAGE: &str = "50";

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiThread {
    id: String,
    unread: bool,
    reason: String,
    updated_at: DateTime<Utc>,
    subject: ApiSubject,
    repository: ApiRepository,
}

#[derive(Debug, Deserialize)]
struct ApiSubject {
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiRepository {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Notification source backed by the GitHub REST API.
pub struct GithubSource {
    http: reqwest::Client,
}

impl GithubSource {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gh-notify/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Convert a `/notifications` response body into [`Notification`]s,
    /// keeping the server's order.
    pub fn parse_notifications(body: &str) -> Result<Vec<Notification>, FetchError> {
        let threads: Vec<ApiThread> = serde_json::from_str(body)?;
        Ok(threads
            .into_iter()
            .map(|t| Notification {
                id: t.id,
                subject_title: t.subject.title,
                subject_type: t.subject.kind,
                subject_url: t.subject.url,
                repository_name: t.repository.full_name,
                reason: t.reason,
                updated_at: t.updated_at,
                unread: t.unread,
            })
            .collect())
    }

    /// Map a non-success status to an error, pulling GitHub's `message`
    /// out of the body when there is one.
    pub fn classify_status(status: u16, body: &str) -> FetchError {
        let message = serde_json::from_str::<ApiErrorBody>(body)
            .map(|b| b.message)
            .unwrap_or_else(|_| body.chars().take(200).collect());

        match status {
            401 | 403 => FetchError::Auth { status, message },
            _ => FetchError::Status { status, message },
        }
    }
}

#[async_trait]
impl NotificationSource for GithubSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn fetch(&self, config: &PollConfig) -> Result<Vec<Notification>, FetchError> {
        let url = format!("{}/notifications", config.api_base);
        let since = config
            .since(Utc::now())
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&config.token)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION)
            .query(&[
                ("all", "false"),
                ("since", since.as_str()),
                ("per_page", PER_PAGE),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Self::classify_status(status.as_u16(), &body));
        }

        let items = Self::parse_notifications(&body)?;
        tracing::debug!(count = items.len(), %since, "fetched notifications");
        Ok(items)
    }

    async fn mark_read(&self, config: &PollConfig, id: &str) -> Result<(), FetchError> {
        let url = format!("{}/notifications/threads/{id}", config.api_base);

        let resp = self
            .http
            .patch(&url)
            .bearer_auth(&config.token)
            .header(ACCEPT, MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;

        // GitHub answers 205 Reset Content on success.
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify_status(status.as_u16(), &body));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

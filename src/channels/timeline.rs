//! Timeline channel: REST client for the social timeline API.
//!
//! Implements both collaborator traits: [`FeedSource`] reads the home
//! timeline, [`ActionExecutor`] favorites, renames and replies. Requests
//! are authenticated with an opaque bearer token.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::FeedError;
use crate::pipeline::types::{Action, ActionExecutor, FeedSource, Item};

pub const DEFAULT_API_BASE: &str = "https://api.twitter.com/1.1";

/// Maximum page the home timeline endpoint serves in one call.
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Error bodies are cut to this many characters in `FeedError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 200;

const HOME_TIMELINE: &str = "statuses/home_timeline.json";
const FAVORITE: &str = "favorites/create.json";
const UPDATE_PROFILE: &str = "account/update_profile.json";
const POST_STATUS: &str = "statuses/update.json";

/// Timeline API configuration.
#[derive(Debug, Clone)]
pub struct TimelineConfig {
    /// Base URL without trailing slash.
    pub base_url: String,
    pub access_token: SecretString,
    /// Posts requested per fetch.
    pub page_size: u32,
}

/// Status object as returned by the timeline endpoint.
#[derive(Debug, Deserialize)]
struct ApiStatus {
    id: i64,
    #[serde(default)]
    full_text: Option<String>,
    #[serde(default)]
    text: Option<String>,
    user: ApiUser,
    #[serde(default)]
    retweeted_status: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    screen_name: String,
}

impl ApiStatus {
    fn into_item(self) -> Item {
        Item {
            id: self.id,
            text: self.full_text.or(self.text).unwrap_or_default(),
            author_handle: self.user.screen_name,
        }
    }
}

pub struct HttpTimelineClient {
    config: TimelineConfig,
    client: reqwest::Client,
}

impl HttpTimelineClient {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.config.base_url)
    }

    /// Send a request and fail on transport errors or non-2xx status.
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, FeedError> {
        let resp = request
            .bearer_auth(self.config.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| FeedError::RequestFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(FeedError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }

    async fn post(&self, endpoint: &str, query: &[(&str, String)]) -> Result<(), FeedError> {
        let request = self.client.post(self.api_url(endpoint)).query(query);
        self.send(endpoint, request).await?;
        Ok(())
    }
}

#[async_trait]
impl FeedSource for HttpTimelineClient {
    fn name(&self) -> &str {
        "timeline"
    }

    async fn fetch_recent(
        &self,
        account: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Item>, FeedError> {
        let mut query = vec![
            ("count", self.config.page_size.to_string()),
            ("include_rts", "false".to_string()),
            ("tweet_mode", "extended".to_string()),
        ];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }

        let request = self.client.get(self.api_url(HOME_TIMELINE)).query(&query);
        let statuses: Vec<ApiStatus> = self
            .send(HOME_TIMELINE, request)
            .await?
            .json()
            .await
            .map_err(|e| FeedError::InvalidResponse {
                endpoint: HOME_TIMELINE.to_string(),
                reason: e.to_string(),
            })?;

        let fetched = statuses.len();
        let items: Vec<Item> = statuses
            .into_iter()
            .filter(|s| s.retweeted_status.is_none())
            .map(ApiStatus::into_item)
            .collect();

        debug!(
            account = %account,
            since_id = ?since_id,
            fetched,
            kept = items.len(),
            "Fetched home timeline"
        );
        Ok(items)
    }
}

#[async_trait]
impl ActionExecutor for HttpTimelineClient {
    async fn execute(&self, action: &Action) -> Result<(), FeedError> {
        match action {
            Action::Favorite { item_id } => {
                self.post(FAVORITE, &[("id", item_id.to_string())]).await
            }
            Action::UpdateProfileName { name } => {
                self.post(UPDATE_PROFILE, &[("name", name.clone())]).await
            }
            Action::PostReply { in_reply_to, text } => {
                self.post(
                    POST_STATUS,
                    &[
                        ("status", text.clone()),
                        ("in_reply_to_status_id", in_reply_to.to_string()),
                    ],
                )
                .await
            }
        }
    }
}

//! Blocking client for the library API.
//!
//! Credentials are never stored here; callers pass a [`SessionContext`] into
//! every request.

use anyhow::{Context, Result, anyhow};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use shelfsync_core::{FeedItem, LinkRequest, SyncRequest, SyncResponse, parse_feed};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

const ACCEPT_HEADER: &str = "application/vnd.koshelf.v1+json";
const USER_ENV: &str = "SHELFSYNC_USER";
const KEY_ENV: &str = "SHELFSYNC_KEY";

/// Account the calls are made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub owner: String,
    pub auth_key: String,
}

impl SessionContext {
    pub fn from_env() -> Result<Self> {
        let owner = env_value(USER_ENV).ok_or_else(|| anyhow!("{USER_ENV} is not set"))?;
        let auth_key = env_value(KEY_ENV).ok_or_else(|| anyhow!("{KEY_ENV} is not set"))?;
        Ok(Self { owner, auth_key })
    }

    /// Owner from the environment, without requiring a key.
    pub fn owner_from_env() -> Option<String> {
        env_value(USER_ENV)
    }
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub struct RemoteLibrary {
    base_url: String,
    client: Client,
}

impl RemoteLibrary {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn fetch_feed(&self, ctx: &SessionContext) -> Result<Vec<FeedItem>> {
        let url = self.endpoint(&["admin", "library"])?;
        let body = self.send(self.client.get(url), ctx)?;
        let items = parse_feed(&body)?;
        info!(owner = %ctx.owner, count = items.len(), "Fetched library feed");
        Ok(items)
    }

    pub fn link(&self, ctx: &SessionContext, request: &LinkRequest) -> Result<LinkRequest> {
        let url = self.endpoint(&["admin", "library", &request.document, "link"])?;
        let body = serde_json::json!({ "library_item_id": request.library_item_id });
        self.send_json(self.client.post(url), ctx, &body)
    }

    pub fn sync(&self, ctx: &SessionContext, request: &SyncRequest) -> Result<SyncResponse> {
        let url = self.endpoint(&[
            "admin",
            "library",
            &request.document,
            "sync",
            request.direction.path_segment(),
        ])?;
        self.send_json(self.client.post(url), ctx, &serde_json::json!({}))
    }

    /// Join percent-encoded path segments onto the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base URL {:?}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("base URL {:?} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn send_json<B, T>(&self, builder: RequestBuilder, ctx: &SessionContext, body: &B) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_string(body).context("failed to encode request body")?;
        let text = self.send(builder.body(payload), ctx)?;
        serde_json::from_str(&text).context("failed to decode response JSON")
    }

    fn send(&self, builder: RequestBuilder, ctx: &SessionContext) -> Result<String> {
        let request = builder
            .header("Accept", ACCEPT_HEADER)
            .header("Content-Type", "application/json")
            .header("X-Auth-User", &ctx.owner)
            .header("X-Auth-Key", &ctx.auth_key)
            .build()
            .context("failed to build request")?;
        let url = request.url().clone();
        debug!(method = %request.method(), %url, "Sending request");

        let response = self
            .client
            .execute(request)
            .with_context(|| format!("request to {url} failed"))?;
        let status = response.status();
        let text = response
            .text()
            .with_context(|| format!("failed to read response from {url}"))?;
        if !status.is_success() {
            return Err(anyhow!("{url} returned {status}: {}", text.trim()));
        }
        Ok(text)
    }
}

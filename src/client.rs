use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::{ApiResponse, Gw2Error};

pub const DEFAULT_API_BASE_URL: &str = "https://api.guildwars2.com";

pub const ACCOUNT_PATH: &str = "/v2/account";
pub const ACCOUNT_ACHIEVEMENTS_PATH: &str = "/v2/account/achievements";
pub const ACHIEVEMENTS_PATH: &str = "/v2/achievements";

pub const MAX_ACHIEVEMENT_IDS_PER_REQUEST: usize = 100;

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE_URL)
    }
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, Gw2Error> {
        // Calls are issued from both the caller's runtime and the callback server's
        // runtime; a pooled connection is bound to the runtime that opened it.
        let mut builder = Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            http,
        })
    }

    pub fn with_http_client(config: ApiClientConfig, http: Client) -> Result<Self, Gw2Error> {
        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn fetch(
        &self,
        api_key: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiResponse, Gw2Error> {
        let url = self.endpoint(path, query)?;
        debug!(%path, "requesting remote api");

        let response = self.http.get(url).bearer_auth(api_key).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
            _ => {
                match status {
                    404 => error!(%path, "remote api: not found"),
                    502 => warn!(%path, "remote api: bad gateway"),
                    _ => error!(%path, status, body = %text, "remote api: failed to parse response"),
                }
                None
            }
        };

        Ok(ApiResponse { status, body })
    }

    pub async fn get_account_info(&self, api_key: &str) -> Result<ApiResponse, Gw2Error> {
        self.fetch(api_key, ACCOUNT_PATH, &[]).await
    }

    pub async fn get_account_achievements(&self, api_key: &str) -> Result<ApiResponse, Gw2Error> {
        self.fetch(api_key, ACCOUNT_ACHIEVEMENTS_PATH, &[]).await
    }

    pub async fn get_achievements_info(
        &self,
        api_key: &str,
        ids: &[u64],
    ) -> Result<ApiResponse, Gw2Error> {
        debug_assert!(ids.len() <= MAX_ACHIEVEMENT_IDS_PER_REQUEST);
        self.fetch(api_key, ACHIEVEMENTS_PATH, &[("ids", join_ids(ids))])
            .await
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, Gw2Error> {
        let mut url = self.base_url.join(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

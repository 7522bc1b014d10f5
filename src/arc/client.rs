use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::error::{ApiError, classify_status};
use super::types::{CirculationsResponse, SearchQuery, SearchResponse};

const SEARCH_PATH: &str = "/content/v4/search/published";
const DRAFT_PATH: &str = "/draft/v1";

/// Operations the pipeline needs from the platform.
///
/// [`ArcClient`] is the real implementation; tests substitute recording fakes.
#[allow(async_fn_in_trait)]
pub trait ContentApi {
    /// One page of published content matching `query`.
    async fn search_page(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError>;

    /// Website ids the story currently circulates on.
    async fn circulations(&self, story_id: &str) -> Result<Vec<String>, ApiError>;

    /// Remove the story's circulation on one website.
    async fn remove_circulation(&self, story_id: &str, website_id: &str) -> Result<(), ApiError>;

    /// Whether the story has a published revision.
    async fn has_published_revision(&self, story_id: &str) -> Result<bool, ApiError>;

    /// Delete the published revision.
    async fn unpublish(&self, story_id: &str) -> Result<(), ApiError>;

    /// Delete the story permanently.
    async fn delete(&self, story_id: &str) -> Result<(), ApiError>;
}

/// HTTP client for the Content and Draft APIs of one organization.
pub struct ArcClient {
    token: SecretString,
    client: Client,
    base_url: String,
    draft_timeout: Duration,
    search_timeout: Duration,
}

/// Default host for an organization.
pub fn default_base_url(org_id: &str) -> String {
    format!("https://api.{org_id}.arcpublishing.com")
}

impl ArcClient {
    pub fn new(token: SecretString, org_id: &str) -> Result<Self, ApiError> {
        Self::with_base_url(token, default_base_url(org_id))
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(token: SecretString, base_url: String) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ApiError::Unexpected(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            token,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            draft_timeout: Duration::from_secs(10),
            search_timeout: Duration::from_secs(60),
        })
    }

    pub fn with_timeouts(mut self, draft: Duration, search: Duration) -> Self {
        self.draft_timeout = draft;
        self.search_timeout = search;
        self
    }

    fn story_url(&self, story_id: &str, suffix: &str) -> String {
        format!("{}{DRAFT_PATH}/story/{story_id}{suffix}", self.base_url)
    }

    fn draft(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(self.token.expose_secret())
            .header("content-type", "application/json")
            .header("Arc-Priority", "ingestion")
            .timeout(self.draft_timeout)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let response = req.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "arc response");
        if status.is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    let retry_after_ms = if status == StatusCode::TOO_MANY_REQUESTS {
        response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000))
    } else {
        None
    };
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    classify_status(status.as_u16(), message, retry_after_ms)
}

impl ContentApi for ArcClient {
    async fn search_page(&self, query: &SearchQuery) -> Result<SearchResponse, ApiError> {
        let req = self
            .client
            .get(format!("{}{SEARCH_PATH}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .query(&query.params())
            .timeout(self.search_timeout);
        let body = self.send(req).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn circulations(&self, story_id: &str) -> Result<Vec<String>, ApiError> {
        let req = self.draft(self.client.get(self.story_url(story_id, "/circulation")));
        let body = self.send(req).await?.text().await?;
        let parsed: CirculationsResponse = serde_json::from_str(&body)?;
        Ok(parsed.website_ids())
    }

    async fn remove_circulation(&self, story_id: &str, website_id: &str) -> Result<(), ApiError> {
        let url = self.story_url(story_id, &format!("/circulation/{website_id}"));
        self.send(self.draft(self.client.delete(url))).await?;
        Ok(())
    }

    async fn has_published_revision(&self, story_id: &str) -> Result<bool, ApiError> {
        let req = self.draft(self.client.get(self.story_url(story_id, "/revision/published")));
        match self.send(req).await {
            Ok(_) => Ok(true),
            Err(ApiError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn unpublish(&self, story_id: &str) -> Result<(), ApiError> {
        let url = self.story_url(story_id, "/revision/published");
        self.send(self.draft(self.client.delete(url))).await?;
        Ok(())
    }

    async fn delete(&self, story_id: &str) -> Result<(), ApiError> {
        let url = self.story_url(story_id, "");
        self.send(self.draft(self.client.delete(url))).await?;
        Ok(())
    }
}

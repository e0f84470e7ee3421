//! Dev.to (Forem) publishing adapter

use async_trait::async_trait;
use crosspost_domain::{ConvertedPost, PublishError, PublishResult, Publisher};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::{build_client, classify_status, retry_after, transport_error};

pub const DEFAULT_API_BASE: &str = "https://dev.to/api";

/// Dev.to rejects articles with more tags than this
const MAX_TAGS: usize = 4;

/// Dev.to publisher
pub struct DevToPublisher {
    client: Client,
    api_key: SecretString,
    base_url: String,
    published: bool,
    enabled: bool,
}

impl DevToPublisher {
    pub fn with_base_url(
        api_key: SecretString,
        base_url: String,
        published: bool,
        timeout: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            client: build_client(timeout),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            published,
            enabled,
        }
    }

    /// Create a disabled publisher (no API key configured)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            api_key: SecretString::new("".into()),
            base_url: String::new(),
            published: false,
            enabled: false,
        }
    }
}

/// Dev.to tags are lowercase alphanumerics
fn sanitize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| {
            tag.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|tag| !tag.is_empty())
        .take(MAX_TAGS)
        .collect()
}

/// 422 bodies naming an already-used title, body or canonical URL
fn is_duplicate_rejection(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("has already been taken") || body.contains("has already been used")
}

#[derive(Serialize)]
struct CreateArticleRequest<'a> {
    article: Article<'a>,
}

#[derive(Serialize)]
struct Article<'a> {
    title: &'a str,
    body_markdown: &'a str,
    published: bool,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreateArticleResponse {
    id: u64,
    url: String,
}

#[async_trait]
impl Publisher for DevToPublisher {
    async fn publish(&self, post: &ConvertedPost) -> Result<PublishResult, PublishError> {
        if !self.enabled {
            return Err(PublishError::Permanent("Publisher is disabled".to_string()));
        }

        let request = CreateArticleRequest {
            article: Article {
                title: &post.metadata.title,
                body_markdown: &post.content,
                published: self.published,
                tags: sanitize_tags(&post.metadata.tags),
                description: Some(post.metadata.description.as_str()).filter(|d| !d.is_empty()),
                canonical_url: post.metadata.canonical_url.as_deref(),
            },
        };

        let response = self
            .client
            .post(format!("{}/articles", self.base_url))
            .header("api-key", self.api_key.expose_secret())
            .header("Accept", "application/vnd.forem.api-v1+json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("devto", e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNPROCESSABLE_ENTITY && is_duplicate_rejection(&body) {
                return Err(PublishError::Duplicate(body));
            }
            return Err(classify_status("devto", status, retry_after, &body));
        }

        let created: CreateArticleResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Permanent(format!("Unexpected Dev.to response: {}", e)))?;

        tracing::info!(file = %post.original_file, url = %created.url, "Published to Dev.to");
        Ok(PublishResult {
            url: created.url,
            platform_id: Some(created.id.to_string()),
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn platform(&self) -> &'static str {
        "devto"
    }
}

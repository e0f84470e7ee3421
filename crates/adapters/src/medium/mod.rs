//! Medium publishing adapter

use async_trait::async_trait;
use crosspost_domain::{ContentFormat, ConvertedPost, PublishError, PublishResult, Publisher};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::http::{build_client, error_from_response, transport_error};

pub const DEFAULT_API_BASE: &str = "https://api.medium.com/v1";

/// Medium keeps at most this many tags per post
const MAX_TAGS: usize = 5;

/// Visibility of posts created on Medium
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediumPublishStatus {
    #[default]
    Draft,
    Public,
    Unlisted,
}

/// Medium publisher
pub struct MediumPublisher {
    client: Client,
    token: SecretString,
    base_url: String,
    publish_status: MediumPublishStatus,
    enabled: bool,
    user_id: OnceCell<String>,
}

impl MediumPublisher {
    pub fn with_base_url(
        token: SecretString,
        base_url: String,
        publish_status: MediumPublishStatus,
        timeout: Duration,
        enabled: bool,
    ) -> Self {
        Self {
            client: build_client(timeout),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            publish_status,
            enabled,
            user_id: OnceCell::new(),
        }
    }

    /// Create a disabled publisher (no token configured)
    pub fn disabled() -> Self {
        Self {
            client: Client::new(),
            token: SecretString::new("".into()),
            base_url: String::new(),
            publish_status: MediumPublishStatus::default(),
            enabled: false,
            user_id: OnceCell::new(),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Resolve the authenticated user's id, once per publisher
    async fn user_id(&self) -> Result<&str, PublishError> {
        let id = self
            .user_id
            .get_or_try_init(|| async {
                let response = self
                    .client
                    .get(format!("{}/me", self.base_url))
                    .header("Authorization", self.bearer())
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| transport_error("medium", e))?;

                if !response.status().is_success() {
                    return Err(error_from_response("medium", response).await);
                }

                let me: Envelope<MeData> = response
                    .json()
                    .await
                    .map_err(|e| PublishError::Permanent(format!("Unexpected /me response: {}", e)))?;
                tracing::debug!(user_id = %me.data.id, "Resolved Medium user");
                Ok::<_, PublishError>(me.data.id)
            })
            .await?;
        Ok(id.as_str())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest<'a> {
    title: &'a str,
    content_format: &'static str,
    content: &'a str,
    tags: Vec<&'a str>,
    publish_status: MediumPublishStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    canonical_url: Option<&'a str>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct MeData {
    id: String,
}

#[derive(Deserialize)]
struct PostData {
    id: String,
    url: String,
}

#[async_trait]
impl Publisher for MediumPublisher {
    async fn publish(&self, post: &ConvertedPost) -> Result<PublishResult, PublishError> {
        if !self.enabled {
            return Err(PublishError::Permanent("Publisher is disabled".to_string()));
        }

        let user_id = self.user_id().await?;

        let request = CreatePostRequest {
            title: &post.metadata.title,
            content_format: match post.content_format {
                ContentFormat::Markdown => "markdown",
                ContentFormat::Html => "html",
            },
            content: &post.content,
            tags: post
                .metadata
                .tags
                .iter()
                .take(MAX_TAGS)
                .map(String::as_str)
                .collect(),
            publish_status: self.publish_status,
            canonical_url: post.metadata.canonical_url.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/users/{}/posts", self.base_url, user_id))
            .header("Authorization", self.bearer())
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error("medium", e))?;

        if !response.status().is_success() {
            return Err(error_from_response("medium", response).await);
        }

        let created: Envelope<PostData> = response
            .json()
            .await
            .map_err(|e| PublishError::Permanent(format!("Unexpected Medium response: {}", e)))?;

        tracing::info!(file = %post.original_file, url = %created.data.url, "Published to Medium");
        Ok(PublishResult {
            url: created.data.url,
            platform_id: Some(created.data.id),
        })
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn platform(&self) -> &'static str {
        "medium"
    }
}

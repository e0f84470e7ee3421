//! Shared HTTP plumbing for platform publishers

use crosspost_domain::PublishError;
use reqwest::{Client, Response, StatusCode, header::RETRY_AFTER};
use std::time::Duration;

pub(crate) fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("crosspost/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
}

/// Transport failures never reached the platform, so they are worth retrying
pub(crate) fn transport_error(platform: &str, error: reqwest::Error) -> PublishError {
    PublishError::Transient(format!("{} request failed: {}", platform, error))
}

/// Longest Retry-After honoured
const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

/// Seconds form of Retry-After
pub(crate) fn retry_after(response: &Response) -> Option<Duration> {
    parse_retry_after(response.headers().get(RETRY_AFTER)?.to_str().ok()?)
}

fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Map a non-success status to a publish error
pub(crate) fn classify_status(
    platform: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> PublishError {
    let detail = format!("{} returned {}: {}", platform, status, body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited { retry_after },
        StatusCode::REQUEST_TIMEOUT => PublishError::Transient(detail),
        s if s.is_server_error() => PublishError::Transient(detail),
        _ => PublishError::Permanent(detail),
    }
}

/// Read the body of a failed response and classify it
pub(crate) async fn error_from_response(platform: &str, response: Response) -> PublishError {
    let status = response.status();
    let retry_after = retry_after(&response);
    let body = response.text().await.unwrap_or_default();
    classify_status(platform, status, retry_after, &body)
}

use std::time::Duration;

use anyhow::Context as _;
use reqwest::{Client, RequestBuilder, Response, StatusCode};

use crate::error::BookingServiceError;

/// One client per process; every provider adapter clones it.
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("build HTTP client")
}

async fn transmit(
    provider: &str,
    request: RequestBuilder,
) -> Result<Response, BookingServiceError> {
    request
        .send()
        .await
        .map_err(|e| BookingServiceError::Provider(format!("{provider}: {e}")))
}

async fn failure(provider: &str, response: Response) -> BookingServiceError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    BookingServiceError::Provider(format!("{provider}: HTTP {status}: {excerpt}"))
}

/// Send `request` and treat transport errors, timeouts and non-2xx answers
/// as provider failures.
pub async fn send(
    provider: &str,
    request: RequestBuilder,
) -> Result<Response, BookingServiceError> {
    let response = transmit(provider, request).await?;
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(failure(provider, response).await)
    }
}

/// Like [`send`], but a remote object that is already gone counts as deleted.
pub async fn send_delete(
    provider: &str,
    request: RequestBuilder,
) -> Result<(), BookingServiceError> {
    let response = transmit(provider, request).await?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        tracing::debug!(provider, %status, "remote object already deleted");
        return Ok(());
    }
    Err(failure(provider, response).await)
}

pub async fn json<T: serde::de::DeserializeOwned>(
    provider: &str,
    response: Response,
) -> Result<T, BookingServiceError> {
    response
        .json()
        .await
        .map_err(|e| BookingServiceError::Provider(format!("{provider}: bad response body: {e}")))
}

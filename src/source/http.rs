//! Shared HTTP plumbing for adapters

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::SourceFailure;

/// Map a transport error to a failure kind.
pub fn classify(err: &reqwest::Error) -> SourceFailure {
    if err.is_timeout() {
        SourceFailure::timeout(err.to_string())
    } else if err.is_decode() {
        SourceFailure::parse(err.to_string())
    } else {
        SourceFailure::network(err.to_string())
    }
}

/// Send `request` and decode a JSON body.
///
/// 401/403 become `Auth` failures, any other non-2xx status is `Network`,
/// and a body that does not match `T` is `Parse`.
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceFailure> {
    let response = request.send().await.map_err(|e| classify(&e))?;
    let status = response.status();
    let url = response.url().clone();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(SourceFailure::auth(format!(
            "{} rejected credentials ({})",
            url.path(),
            status
        )));
    }
    if !status.is_success() {
        return Err(SourceFailure::network(format!(
            "{} returned {}",
            url.path(),
            status
        )));
    }

    let body = response.text().await.map_err(|e| classify(&e))?;
    serde_json::from_str(&body)
        .map_err(|e| SourceFailure::parse(format!("{}: {}", url.path(), e)))
}

//! Home Assistant REST client shared by the calendar and sensor adapters

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use url::Url;

use super::{http, SourceFailure};
use crate::{Error, Result};

/// Base URL plus bearer token for the Home Assistant API
///
/// `base` is the API root, e.g. `http://homeassistant.local:8123/api/`.
/// A missing trailing slash is added so relative joins keep the `api/`
/// segment.
#[derive(Clone)]
pub struct HomeAssistant {
    client: reqwest::Client,
    base: Url,
}

impl HomeAssistant {
    pub fn new(base: &str, token: &str) -> Result<Self> {
        let mut normalized = base.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base = Url::parse(&normalized)
            .map_err(|e| Error::ConfigError(format!("Invalid Home Assistant URL '{}': {}", base, e)))?;

        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| Error::ConfigError(format!("Invalid Home Assistant token: {}", e)))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve `path` against the API root and append `query`.
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> std::result::Result<Url, SourceFailure> {
        let mut url = self
            .base
            .join(path)
            .map_err(|e| SourceFailure::network(format!("bad request path '{}': {}", path, e)))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        timeout: Duration,
    ) -> std::result::Result<T, SourceFailure> {
        let url = self.url(path, query)?;
        http::get_json(self.client.get(url).timeout(timeout)).await
    }
}

//! HTTP client for the marker REST API.
//!
//! This module provides the `ApiClient` struct for querying nearby markers
//! and submitting marker mutations. Write calls carry the session's bearer
//! token; the server enforces ownership.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::models::{Envelope, Marker, MarkerUpdate, NewMarker, Report};

use super::request::MARKERS_PATH;
use super::{ApiError, MarkerApi, MarkerRequest};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds, used when the config does not set one.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize)]
struct ReportBody<'a> {
    reason: &'a str,
}

/// API client for the marker service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for the configured base URL
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_base_url(&config.api_base_url, Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/markers/{segments..}` with each segment percent-encoded, so
    /// ids cannot change the route.
    fn marker_url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.url(MARKERS_PATH))
            .map_err(|e| ApiError::Validation(format!("invalid API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Validation(format!("invalid API URL: {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Validation("token contains invalid characters".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.headers(self.auth_headers()?).send().await?;
        let response = Self::check_response(response).await?;
        Ok(response.text().await?)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let text = self.send(request).await?;
        decode_enveloped(&text)
    }
}

/// Parse a marker list from either `{data, pagination}` or a bare array.
pub fn decode_markers(text: &str) -> Result<Vec<Marker>, ApiError> {
    let envelope: Envelope<Vec<Marker>> =
        serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
    let (markers, pagination) = envelope.into_parts();
    if let Some(p) = pagination {
        debug!(page = p.page, pages = p.pages, total = p.total, "Paged marker response");
    }
    Ok(markers)
}

fn decode_enveloped<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str::<Envelope<T>>(text)
        .map(Envelope::into_data)
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl MarkerApi for ApiClient {
    async fn query(&self, request: &MarkerRequest) -> Result<Vec<Marker>, ApiError> {
        debug!(request = %request, "Querying markers");
        let builder = match request {
            MarkerRequest::Get { path, params } => self.client.get(self.url(path)).query(params),
            MarkerRequest::Search(query) => self.client.post(self.url(request.path())).json(query),
        };
        let text = self.send(builder).await?;
        decode_markers(&text)
    }

    async fn marker(&self, id: &str) -> Result<Marker, ApiError> {
        self.send_json(self.client.get(self.marker_url(&[id])?)).await
    }

    async fn user_markers(&self, user_id: &str) -> Result<Vec<Marker>, ApiError> {
        let url = self.marker_url(&["user", user_id])?;
        let text = self.send(self.client.get(url)).await?;
        decode_markers(&text)
    }

    async fn create_marker(&self, marker: &NewMarker) -> Result<Marker, ApiError> {
        self.send_json(self.client.post(self.url(MARKERS_PATH)).json(marker))
            .await
    }

    async fn update_marker(&self, id: &str, update: &MarkerUpdate) -> Result<Marker, ApiError> {
        self.send_json(self.client.put(self.marker_url(&[id])?).json(update))
            .await
    }

    async fn resolve_marker(&self, id: &str) -> Result<Marker, ApiError> {
        self.send_json(self.client.put(self.marker_url(&[id, "resolve"])?))
            .await
    }

    async fn delete_marker(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.client.delete(self.marker_url(&[id])?)).await?;
        Ok(())
    }

    async fn report_marker(&self, id: &str, reason: &str) -> Result<Report, ApiError> {
        let body = ReportBody { reason };
        self.send_json(self.client.post(self.marker_url(&[id, "report"])?).json(&body))
            .await
    }
}

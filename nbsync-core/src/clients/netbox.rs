//! Client for the NetBox REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::gateway::{Filter, Gateway, GatewayResult};
use crate::model::RemoteObject;

const PAGE_SIZE: &str = "1000";

/// Connection settings for [`NetboxClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the NetBox instance, without `/api`.
    pub url: String,
    pub token: String,
    pub validate_certs: bool,
    pub timeout: Duration,
    /// Extra attempts for idempotent requests after a transient failure.
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt.
    pub retry_backoff: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            validate_certs: true,
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Deserialize)]
struct Page {
    next: Option<String>,
    results: Vec<RemoteObject>,
}

/// Gateway over HTTP.
#[derive(Debug, Clone)]
pub struct NetboxClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl NetboxClient {
    pub fn new(config: ClientConfig) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.validate_certs)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/api/{}/",
            self.config.url.trim_end_matches('/'),
            endpoint.trim_matches('/')
        )
    }

    fn object_url(&self, endpoint: &str, id: u64) -> String {
        format!("{}{}/", self.endpoint_url(endpoint), id)
    }

    /// Send one request, retrying transient failures unless the method is POST.
    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Map<String, Value>>,
    ) -> GatewayResult<Option<Value>> {
        let retries = if method == Method::POST {
            0
        } else {
            self.config.max_retries
        };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(method.clone(), url, query, body).await {
                Err(e) if attempt <= retries && is_transient(&e) => {
                    let delay = self.config.retry_backoff * attempt;
                    warn!(
                        method = %method,
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after error: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        body: Option<&Map<String, Value>>,
    ) -> GatewayResult<Option<Value>> {
        debug!(method = %method, url, "NetBox request");
        let mut request = self
            .http
            .request(method, url)
            .header("Authorization", format!("Token {}", self.config.token))
            .header("Accept", "application/json")
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                message: error_message(&message),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        response
            .json::<Value>()
            .await
            .map(Some)
            .map_err(|e| GatewayError::Network(format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl Gateway for NetboxClient {
    async fn list(&self, endpoint: &str, filter: &Filter) -> GatewayResult<Vec<RemoteObject>> {
        let mut query: Vec<(String, String)> = filter.pairs().to_vec();
        query.push(("limit".to_string(), PAGE_SIZE.to_string()));

        let mut objects = Vec::new();
        let mut url = self.endpoint_url(endpoint);
        let mut first = true;
        loop {
            // `next` links already carry the query string.
            let params: &[(String, String)] = if first { &query } else { &[] };
            let body = self.send(Method::GET, &url, params, None).await?;
            let page: Page = serde_json::from_value(body.unwrap_or(Value::Null))
                .map_err(|e| GatewayError::Network(format!("invalid list response: {}", e)))?;
            objects.extend(page.results);
            match page.next {
                Some(next) => {
                    url = next;
                    first = false;
                }
                None => break,
            }
        }

        debug!(endpoint, filter = %filter, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn create(
        &self,
        endpoint: &str,
        payload: &Map<String, Value>,
    ) -> GatewayResult<RemoteObject> {
        let url = self.endpoint_url(endpoint);
        let body = self.send(Method::POST, &url, &[], Some(payload)).await?;
        parse_object(body)
    }

    async fn update(
        &self,
        endpoint: &str,
        id: u64,
        payload: &Map<String, Value>,
    ) -> GatewayResult<RemoteObject> {
        let url = self.object_url(endpoint, id);
        let body = self.send(Method::PATCH, &url, &[], Some(payload)).await?;
        parse_object(body)
    }

    async fn delete(&self, endpoint: &str, id: u64) -> GatewayResult<()> {
        let url = self.object_url(endpoint, id);
        self.send(Method::DELETE, &url, &[], None).await?;
        Ok(())
    }
}

fn parse_object(body: Option<Value>) -> GatewayResult<RemoteObject> {
    serde_json::from_value(body.unwrap_or(Value::Null))
        .map_err(|e| GatewayError::Network(format!("invalid object response: {}", e)))
}

fn is_transient(error: &GatewayError) -> bool {
    match error {
        GatewayError::Network(_) => true,
        GatewayError::Remote { status, .. } => matches!(status, 502..=504),
    }
}

/// NetBox reports errors as `{"detail": ...}` or as field-keyed lists; keep the text either way.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map
            .get("detail")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(map.clone()).to_string()),
        _ => body.trim().to_string(),
    }
}

//! HTTP implementation of [`RemoteSource`] over a REST service.
//!
//! | call     | request                      |
//! |----------|------------------------------|
//! | `list`   | `GET /{resource}`            |
//! | `get`    | `GET /{resource}/{id}`       |
//! | `create` | `POST /{resource}`           |
//! | `update` | `PATCH /{resource}/{id}`     |
//! | `delete` | `DELETE /{resource}/{id}`    |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::{LifeDbError, RemoteError, Result};

use super::types::RemoteSource;

#[derive(Debug, Clone)]
pub struct HttpRemoteSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteSource {
    /// Build a client from `config`. Fails only on an unusable token or TLS
    /// setup.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                RemoteError::Transport {
                    message: format!("invalid API token header value: {e}"),
                    source: Some(Box::new(e)),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder.build().map_err(transport)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, resource: &str, id: Option<&str>) -> RequestBuilder {
        let url = match id {
            Some(id) => format!("{}/{resource}/{id}", self.base_url),
            None => format!("{}/{resource}", self.base_url),
        };
        self.client.request(method, url)
    }

    /// Send `request` and decode the body. `None` for an empty 2xx body.
    async fn send(&self, request: RequestBuilder) -> Result<Option<Value>> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        debug!(status = %status, bytes = body.len(), "remote response received");

        if !status.is_success() {
            let payload = serde_json::from_slice(&body)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
            return Err(RemoteError::Rejection {
                status: status.as_u16(),
                payload,
            }
            .into());
        }

        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| RemoteError::Decode(e.to_string()).into())
    }

    async fn send_for_value(&self, request: RequestBuilder) -> Result<Value> {
        self.send(request)
            .await?
            .ok_or_else(|| RemoteError::Decode("empty response body".into()).into())
    }
}

fn transport(e: reqwest::Error) -> LifeDbError {
    RemoteError::Transport {
        message: e.to_string(),
        source: Some(Box::new(e)),
    }
    .into()
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn list(&self, resource: &str) -> Result<Vec<Value>> {
        match self
            .send_for_value(self.request(Method::GET, resource, None))
            .await?
        {
            Value::Array(items) => Ok(items),
            other => Err(RemoteError::Decode(format!(
                "expected an array for {resource}, got {other}"
            ))
            .into()),
        }
    }

    async fn get(&self, resource: &str, id: &str) -> Result<Value> {
        self.send_for_value(self.request(Method::GET, resource, Some(id)))
            .await
    }

    async fn create(&self, resource: &str, body: Value) -> Result<Value> {
        self.send_for_value(self.request(Method::POST, resource, None).json(&body))
            .await
    }

    async fn update(&self, resource: &str, id: &str, patch: Value) -> Result<Value> {
        self.send_for_value(self.request(Method::PATCH, resource, Some(id)).json(&patch))
            .await
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, resource, Some(id)))
            .await
            .map(|_| ())
    }
}

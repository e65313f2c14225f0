//! Thin wrapper over `reqwest` shared by every remote client.
//!
//! Callers build requests (bearer auth, query, JSON or form body) and hand
//! them to [`HttpClient::execute`], which classifies the outcome. Nothing
//! here retries.
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("could not decode response (status {status}): {source}")]
    Decode {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Transport(e) => e.status(),
            HttpError::Status { status, .. } | HttpError::Decode { status, .. } => Some(*status),
        }
    }
}

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub body: T,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Start a request that expects a JSON answer.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client.request(method, url).header(ACCEPT, "application/json")
    }

    /// Send and decode. Non-2xx statuses become [`HttpError::Status`]; an
    /// empty 2xx body decodes as JSON `null`.
    pub async fn execute<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<Reply<T>, HttpError> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(HttpError::Status { status, body: text });
        }
        let raw = if text.trim().is_empty() { "null" } else { text.as_str() };
        let body = serde_json::from_str(raw).map_err(|source| HttpError::Decode { status, source })?;
        Ok(Reply { status, body })
    }
}

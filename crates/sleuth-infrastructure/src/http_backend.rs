//! HttpAnalysisBackend - REST implementation of the analysis backend.
//!
//! Endpoints (relative to the configured base URL):
//! - `POST prepare`              body `{"address": ...}`
//! - `GET  prepare/{tag}/status`
//! - `POST chat`                 body `{"tag": ..., "query": ...}`

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use sleuth_core::backend::{AnalysisBackend, Answer, PreparationStatus};
use sleuth_core::config::BackendConfig;
use sleuth_core::error::{Result, SleuthError};
use sleuth_core::session::Citation;
use std::time::Duration;

/// Backend client that talks to the analysis service over HTTP.
#[derive(Clone)]
pub struct HttpAnalysisBackend {
    client: Client,
    base_url: Url,
}

impl HttpAnalysisBackend {
    /// Creates a client for `base_url` with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the URL cannot be parsed or cannot carry
    /// a path, or if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| SleuthError::config(format!("Invalid backend URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SleuthError::config(format!(
                "Backend URL '{base_url}' cannot be used as a base"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SleuthError::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SleuthError::config("Backend URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T>(&self, operation: &'static str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = request.send().await.map_err(|err| {
            SleuthError::network(format!("{operation} request failed: {err}"))
        })?;

        let response = check_status(operation, response).await?;

        response.json::<T>().await.map_err(|err| {
            SleuthError::network(format!("Failed to parse {operation} response: {err}"))
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn prepare(&self, address: &str) -> Result<PreparationStatus> {
        let url = self.endpoint(&["prepare"])?;
        tracing::debug!(%url, address, "[HttpAnalysisBackend] Requesting preparation");

        let envelope: StatusEnvelope = self
            .send("prepare", self.client.post(url).json(&PrepareRequest { address }))
            .await?;
        Ok(envelope.status)
    }

    async fn prepare_status(&self, tag: &str) -> Result<PreparationStatus> {
        let url = self.endpoint(&["prepare", tag, "status"])?;
        tracing::trace!(%url, tag, "[HttpAnalysisBackend] Polling preparation status");

        let envelope: StatusEnvelope = self.send("prepare_status", self.client.get(url)).await?;
        Ok(envelope.status)
    }

    async fn ask(&self, tag: &str, query: &str) -> Result<Answer> {
        let url = self.endpoint(&["chat"])?;
        tracing::debug!(%url, tag, "[HttpAnalysisBackend] Sending chat query");

        let response: ChatResponse = self
            .send("ask", self.client.post(url).json(&ChatRequest { tag, query }))
            .await?;
        Ok(response.into())
    }
}

async fn check_status(operation: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    let detail = extract_detail(&body_text).unwrap_or(body_text);

    Err(SleuthError::http_status(
        status.as_u16(),
        format!("{operation} returned {status}: {detail}"),
    ))
}

/// Pulls the `detail` field out of a FastAPI-style error body.
fn extract_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct PrepareRequest<'a> {
    address: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    tag: &'a str,
    query: &'a str,
}

#[derive(Deserialize)]
struct StatusEnvelope {
    status: PreparationStatus,
}

#[derive(Deserialize)]
struct ChatResponse {
    answer: String,
    #[serde(default)]
    sources: Option<Vec<SourceDto>>,
}

/// A retrieved source: either the bare document text or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceDto {
    Text(String),
    Document {
        #[serde(alias = "page_content")]
        content: String,
        #[serde(default, alias = "source", alias = "url")]
        reference: Option<String>,
    },
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl From<SourceDto> for Citation {
    fn from(dto: SourceDto) -> Self {
        match dto {
            SourceDto::Text(content) => Citation::new(content),
            SourceDto::Document { content, reference } => Citation { content, reference },
        }
    }
}

impl From<ChatResponse> for Answer {
    fn from(response: ChatResponse) -> Self {
        Answer {
            answer: response.answer,
            sources: response
                .sources
                .unwrap_or_default()
                .into_iter()
                .map(Citation::from)
                .collect(),
        }
    }
}

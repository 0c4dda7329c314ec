//! Model sidecar client
//!
//! The sidecar hosts the fine-tuned model and the document search service.
//! Every endpoint takes `{"message": ...}` and answers `{"response": ...}`,
//! optionally with a `sources` array of citations.

use super::retrieval::SourceCitation;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default sidecar timeout
pub const DEFAULT_SIDECAR_TIMEOUT: Duration = Duration::from_secs(30);

/// Sidecar endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidecarEndpoint {
    /// Fine-tuned model
    Tuning,
    /// Document search service
    Vector,
    /// Hosted general model
    Openai,
}

impl SidecarEndpoint {
    /// URL path on the sidecar
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Tuning => "/tuning",
            Self::Vector => "/vector",
            Self::Openai => "/openai",
        }
    }
}

/// Reply from a sidecar endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidecarReply {
    /// Answer text
    pub response: String,
    /// Optional source citations
    #[serde(default)]
    pub sources: Vec<SourceCitation>,
}

/// A model sidecar
#[async_trait]
pub trait Sidecar: Send + Sync {
    /// Ask one endpoint
    async fn ask(&self, endpoint: SidecarEndpoint, message: &str) -> Result<SidecarReply>;
}

#[derive(Serialize)]
struct SidecarRequest<'a> {
    message: &'a str,
}

/// HTTP sidecar client
pub struct HttpSidecar {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpSidecar {
    /// Create a client for the sidecar at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Sidecar(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, endpoint: SidecarEndpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Sidecar for HttpSidecar {
    #[instrument(skip(self, endpoint, message), fields(endpoint = endpoint.path()))]
    async fn ask(&self, endpoint: SidecarEndpoint, message: &str) -> Result<SidecarReply> {
        debug!("Calling sidecar");
        let response = self
            .client
            .post(self.url(endpoint))
            .json(&SidecarRequest { message })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Sidecar(format!("timeout after {}ms", self.timeout.as_millis()))
                } else {
                    Error::Sidecar(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Sidecar(format!("HTTP {}", status)));
        }

        response
            .json::<SidecarReply>()
            .await
            .map_err(|e| Error::Sidecar(format!("invalid reply: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let sidecar = HttpSidecar::new("http://localhost:8001/", DEFAULT_SIDECAR_TIMEOUT).unwrap();
        assert_eq!(
            sidecar.url(SidecarEndpoint::Tuning),
            "http://localhost:8001/tuning"
        );
        assert_eq!(
            sidecar.url(SidecarEndpoint::Vector),
            "http://localhost:8001/vector"
        );
    }

    #[test]
    fn test_reply_without_sources() {
        let reply: SidecarReply = serde_json::from_str(r#"{"response": "ok"}"#).unwrap();
        assert_eq!(reply.response, "ok");
        assert!(reply.sources.is_empty());
    }
}

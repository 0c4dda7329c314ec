//! Retrieval-augmented answers
//!
//! Passages come from an external similarity index. The handler joins the
//! top-K into a context block with metadata headers, bounded by a character
//! budget, and hands it to the generator. With no passages the generator is
//! never called.

use super::generation::GenerationHandler;
use super::session::Turn;
use crate::error::{Error, Result};
use async_trait::async_trait;
use parentline_llm::util::truncate_chars;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Passages fetched per query by default
pub const DEFAULT_TOP_K: usize = 5;

/// Context block budget in characters
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Sources cited back to the client
const MAX_CITATIONS: usize = 3;

const PREVIEW_CHARS: usize = 100;

/// Longest category or section name copied into a context header
const HEADER_FIELD_CHARS: usize = 80;

/// Reply when the index has nothing for the query
pub const NO_MATCH_MESSAGE: &str = "I couldn't find any material on that topic in the \
parenting documents. Could you rephrase the question or ask about something more specific?";

/// A passage returned by the similarity index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Passage text
    pub content: String,
    /// Document category
    #[serde(default)]
    pub category: String,
    /// Section title within the document
    #[serde(default)]
    pub section: String,
    /// Relevance score (higher is closer)
    #[serde(default)]
    pub score: f32,
}

/// A source citation sent to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    /// Document category
    #[serde(default)]
    pub category: String,
    /// Section title
    #[serde(default)]
    pub section: String,
    /// Start of the passage
    #[serde(default)]
    pub content_preview: String,
}

impl From<&RetrievedPassage> for SourceCitation {
    fn from(p: &RetrievedPassage) -> Self {
        let head = truncate_chars(&p.content, PREVIEW_CHARS);
        let content_preview = if head.len() < p.content.len() {
            format!("{}...", head)
        } else {
            head.to_string()
        };
        Self {
            category: p.category.clone(),
            section: p.section.clone(),
            content_preview,
        }
    }
}

/// A similarity index over parenting documents
#[async_trait]
pub trait PassageIndex: Send + Sync {
    /// Top `k` passages for `query`, best first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>>;
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    passages: Vec<IndexHit>,
}

#[derive(Deserialize)]
struct IndexHit {
    content: String,
    #[serde(default)]
    metadata: HitMetadata,
    #[serde(default)]
    score: f32,
}

#[derive(Deserialize, Default)]
struct HitMetadata {
    #[serde(default)]
    category_name: String,
    #[serde(default)]
    section_title: String,
}

/// Similarity index reached over HTTP (`POST {base}/search`)
pub struct HttpPassageIndex {
    client: Client,
    base_url: String,
}

impl HttpPassageIndex {
    /// Create a client for the index at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PassageIndex for HttpPassageIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Retrieval(format!("HTTP {}", response.status())));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Retrieval(format!("invalid reply: {}", e)))?;

        Ok(body
            .passages
            .into_iter()
            .take(k)
            .map(|hit| RetrievedPassage {
                content: hit.content,
                category: hit.metadata.category_name,
                section: hit.metadata.section_title,
                score: hit.score,
            })
            .collect())
    }
}

/// Answer plus the sources it was drawn from
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalAnswer {
    /// Answer text
    pub text: String,
    /// Cited sources (at most three)
    pub sources: Vec<SourceCitation>,
}

/// Build the context block, stopping at `max_chars`
#[must_use]
pub fn build_context(passages: &[RetrievedPassage], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;

    for (i, passage) in passages
        .iter()
        .filter(|p| !p.content.trim().is_empty())
        .enumerate()
    {
        let header = format!(
            "[Source {}: {} > {}]\n",
            i + 1,
            truncate_chars(&passage.category, HEADER_FIELD_CHARS),
            truncate_chars(&passage.section, HEADER_FIELD_CHARS)
        );
        let header_len = header.chars().count();
        if used + header_len >= max_chars {
            break;
        }
        let room = max_chars - used - header_len;
        let body = truncate_chars(&passage.content, room);

        context.push_str(&header);
        context.push_str(body);
        context.push_str("\n\n");
        used += header_len + body.chars().count() + 2;

        if body.len() < passage.content.len() {
            break;
        }
    }

    context.trim_end().to_string()
}

/// Retrieval-augmented handler
pub struct RetrievalHandler {
    index: Arc<dyn PassageIndex>,
    generator: Arc<GenerationHandler>,
    top_k: usize,
    max_context_chars: usize,
}

impl RetrievalHandler {
    /// Create a handler
    pub fn new(
        index: Arc<dyn PassageIndex>,
        generator: Arc<GenerationHandler>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            index,
            generator,
            top_k,
            max_context_chars,
        }
    }

    /// Answer `question` from retrieved passages
    pub async fn answer(&self, question: &str, history: &[Turn]) -> Result<RetrievalAnswer> {
        let passages = self.index.search(question, self.top_k).await?;

        if passages.is_empty() {
            info!("No passages matched, skipping generation");
            return Ok(RetrievalAnswer {
                text: NO_MATCH_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        }

        let context = build_context(&passages, self.max_context_chars);
        if context.trim().is_empty() {
            info!(
                passages = passages.len(),
                "No passage fit the context budget, skipping generation"
            );
            return Ok(RetrievalAnswer {
                text: NO_MATCH_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        }
        debug!(
            passages = passages.len(),
            context_chars = context.chars().count(),
            "Context assembled"
        );

        let text = self
            .generator
            .answer_with_context(question, history, &context)
            .await?;

        Ok(RetrievalAnswer {
            text,
            sources: passages
                .iter()
                .take(MAX_CITATIONS)
                .map(SourceCitation::from)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parentline_llm::MockProvider;

    struct FakeIndex(Vec<RetrievedPassage>);

    #[async_trait]
    impl PassageIndex for FakeIndex {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    fn passage(content: &str) -> RetrievedPassage {
        RetrievedPassage {
            content: content.to_string(),
            category: "Sleep".to_string(),
            section: "Night waking".to_string(),
            score: 0.9,
        }
    }

    fn handler(passages: Vec<RetrievedPassage>, mock: &MockProvider) -> RetrievalHandler {
        let generator = Arc::new(GenerationHandler::new(Arc::new(mock.clone()), "", 10));
        RetrievalHandler::new(Arc::new(FakeIndex(passages)), generator, 5, 4000)
    }

    #[tokio::test]
    async fn test_empty_index_never_calls_generator() {
        let mock = MockProvider::new();
        let answer = handler(vec![], &mock).answer("night terrors?", &[]).await.unwrap();
        assert_eq!(answer.text, NO_MATCH_MESSAGE);
        assert!(answer.sources.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_answer_cites_top_three() {
        let mock = MockProvider::new();
        mock.push_reply("Night waking is normal until about 6 months.");
        let passages = (0..6).map(|i| passage(&format!("passage {}", i))).collect();

        let answer = handler(passages, &mock).answer("night waking", &[]).await.unwrap();
        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.sources[0].content_preview, "passage 0");

        let prompt = &mock.requests()[0].messages[1].content;
        assert!(prompt.contains("[Source 1: Sleep > Night waking]"));
        assert!(prompt.contains("passage 4"));
        assert!(!prompt.contains("passage 5"));
    }

    #[test]
    fn test_context_respects_budget() {
        let passages = vec![passage(&"x".repeat(500)), passage(&"y".repeat(500))];
        let context = build_context(&passages, 300);
        assert!(context.chars().count() <= 300);
        assert!(!context.contains('y'));
    }

    #[tokio::test]
    async fn test_long_section_title_keeps_passage_body() {
        let mock = MockProvider::new();
        mock.push_reply("Start with a few minutes a day.");
        let mut long = passage("Tummy time builds neck strength.");
        long.section = "s".repeat(4100);

        let answer = handler(vec![long], &mock).answer("tummy time?", &[]).await.unwrap();
        assert_eq!(answer.text, "Start with a few minutes a day.");

        let prompt = &mock.requests()[0].messages[1].content;
        assert!(prompt.contains("Tummy time builds neck strength."));
    }

    #[tokio::test]
    async fn test_tiny_budget_never_calls_generator() {
        let mock = MockProvider::new();
        let generator = Arc::new(GenerationHandler::new(Arc::new(mock.clone()), "", 10));
        let handler = RetrievalHandler::new(
            Arc::new(FakeIndex(vec![passage("Tummy time builds neck strength.")])),
            generator,
            5,
            10,
        );

        let answer = handler.answer("tummy time?", &[]).await.unwrap();
        assert_eq!(answer.text, NO_MATCH_MESSAGE);
        assert!(answer.sources.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_passages_never_call_generator() {
        let mock = MockProvider::new();
        let answer = handler(vec![passage("   ")], &mock)
            .answer("tummy time?", &[])
            .await
            .unwrap();
        assert_eq!(answer.text, NO_MATCH_MESSAGE);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_citation_preview_truncates() {
        let citation = SourceCitation::from(&passage(&"z".repeat(150)));
        assert_eq!(citation.content_preview.len(), 103);
        assert!(citation.content_preview.ends_with("..."));
    }
}

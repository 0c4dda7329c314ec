//! Two-stage topic classification
//!
//! Stage one asks the model whether a message is about parenting at all;
//! stage two picks a topic from a closed set. Both stages ask for a small
//! JSON object and read the first `{...}` block of the reply. Any failure
//! (call error, missing block, bad JSON, unknown label) falls back to
//! in-domain / general, so classification never aborts a turn.

use parentline_llm::{CompletionRequest, LlmProvider, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const DOMAIN_PROMPT: &str = "You decide whether a message is a parenting question. \
Parenting covers pregnancy, infant and child care, sleep, feeding, health, development, \
behaviour and family life. Reply with JSON only: {\"is_parenting\": true} or {\"is_parenting\": false}.";

const TOPIC_PROMPT: &str = "Classify the parenting question into one category. \
\"sleep\": sleep patterns, naps, night waking, sleep training. \
\"development\": milestones, motor, language, cognitive or social development. \
\"other\": anything else. \
Reply with JSON only, e.g. {\"category\": \"sleep\"}.";

/// Topic of an in-domain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Sleep and routines
    Sleep,
    /// Developmental milestones
    Development,
    /// Any other parenting topic
    General,
}

impl Topic {
    /// Label stored on turns and used in route tables
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Development => "development",
            Self::General => "general",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "sleep" => Some(Self::Sleep),
            "development" => Some(Self::Development),
            "other" | "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Classification of one input message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Not a parenting question
    OffTopic,
    /// A parenting question about the given topic
    Topical(Topic),
}

impl RoutingDecision {
    /// Category label for the turn
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::OffTopic => "off_topic",
            Self::Topical(topic) => topic.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DomainVerdict {
    is_parenting: bool,
}

#[derive(Debug, Deserialize)]
struct TopicVerdict {
    category: String,
}

/// Extract and decode the first `{...}` block of a model reply
fn first_json_block<T: serde::de::DeserializeOwned>(reply: &str) -> Option<T> {
    static JSON_BLOCK: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = JSON_BLOCK.get_or_init(|| Regex::new(r"\{[^}]*\}").unwrap());

    let block = re.find(reply)?;
    serde_json::from_str(block.as_str()).ok()
}

/// Classifier backed by an LLM provider
pub struct Classifier {
    llm: Arc<dyn LlmProvider>,
    model: String,
}

impl Classifier {
    /// Create a classifier using `model` (empty means the provider default)
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    async fn ask(&self, system: &str, message: &str) -> parentline_llm::Result<String> {
        let request = CompletionRequest::new(self.model.clone())
            .with_message(Message::system(system))
            .with_message(Message::user(message))
            .with_max_tokens(20)
            .with_temperature(0.0);
        Ok(self.llm.complete(request).await?.content)
    }

    /// Stage one: is this a parenting question?
    pub async fn is_in_domain(&self, message: &str) -> bool {
        match self.ask(DOMAIN_PROMPT, message).await {
            Ok(reply) => match first_json_block::<DomainVerdict>(&reply) {
                Some(v) => v.is_parenting,
                None => {
                    warn!(reply = %reply, "Unparseable domain verdict, assuming in-domain");
                    true
                }
            },
            Err(e) => {
                warn!(error = %e, "Domain classification failed, assuming in-domain");
                true
            }
        }
    }

    /// Stage two: which topic?
    pub async fn topic(&self, message: &str) -> Topic {
        match self.ask(TOPIC_PROMPT, message).await {
            Ok(reply) => first_json_block::<TopicVerdict>(&reply)
                .and_then(|v| Topic::from_label(&v.category))
                .unwrap_or_else(|| {
                    warn!(reply = %reply, "Unparseable topic verdict, using general");
                    Topic::General
                }),
            Err(e) => {
                warn!(error = %e, "Topic classification failed, using general");
                Topic::General
            }
        }
    }

    /// Run both stages
    pub async fn classify(&self, message: &str) -> RoutingDecision {
        if !self.is_in_domain(message).await {
            debug!("Message classified off-topic");
            return RoutingDecision::OffTopic;
        }
        let topic = self.topic(message).await;
        debug!(topic = topic.as_str(), "Message classified");
        RoutingDecision::Topical(topic)
    }
}

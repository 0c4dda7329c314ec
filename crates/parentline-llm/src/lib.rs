//! Parentline LLM - text generation behind a provider trait
//!
//! This crate provides the generation seam used by the chat engine:
//! - Provider: `LlmProvider` trait every backend implements
//! - OpenAI-compatible: chat-completions over HTTP (OpenAI, vLLM, Ollama's `/v1`)
//! - Mock: queued responses for tests

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod util;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use openai::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::LlmProvider;

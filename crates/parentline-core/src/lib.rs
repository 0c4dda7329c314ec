//! Parentline Core - chat engine and identity helpers
//!
//! This crate provides the conversational half of the platform:
//! - Chat: conversation sessions, session stores, classification, routing,
//!   retrieval-augmented answers and sidecar calls
//! - OAuth: social-login provider adapters
//! - Token: opaque bearer token minting and hashing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chat;
pub mod error;
pub mod oauth;
pub mod token;

pub use chat::{
    Backend, ChatReply, ChatService, Classifier, ConversationSession, GenerationHandler,
    HttpPassageIndex, HttpSidecar, MemoryStore, PassageIndex, RedisStore, RetrievalHandler,
    RetrievedPassage, RouteTable, RoutingDecision, SessionKind, SessionStatus, SessionStore,
    Sidecar, SidecarEndpoint, SidecarReply, SourceCitation, Topic, Turn, TurnRole,
};
pub use error::{Error, Result};
pub use oauth::{OAuthClient, OAuthProvider, ProfileFetcher, SocialProfile};
pub use token::{hash_token, IssuedTokens, TokenKind};

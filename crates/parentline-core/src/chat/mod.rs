//! Chat engine
//!
//! - `session`: conversation sessions and turns
//! - `store`: session storage backends (memory, Redis)
//! - `classifier`: two-stage topic classification
//! - `sidecar`: model sidecar client
//! - `generation`: plain LLM answers
//! - `retrieval`: retrieval-augmented answers
//! - `router`: the per-turn pipeline

pub mod classifier;
pub mod generation;
pub mod retrieval;
pub mod router;
pub mod session;
pub mod sidecar;
pub mod store;

pub use classifier::{Classifier, RoutingDecision, Topic};
pub use generation::GenerationHandler;
pub use retrieval::{
    HttpPassageIndex, PassageIndex, RetrievalAnswer, RetrievalHandler, RetrievedPassage,
    SourceCitation,
};
pub use router::{category_label, Backend, ChatReply, ChatService, RouteTable, APOLOGY_MESSAGE};
pub use session::{ConversationSession, SessionKind, SessionStatus, Turn, TurnRole};
pub use sidecar::{HttpSidecar, Sidecar, SidecarEndpoint, SidecarReply};
pub use store::{MemoryStore, RedisStore, SessionStore};

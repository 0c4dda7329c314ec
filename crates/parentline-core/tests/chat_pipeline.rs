//! End-to-end tests for the chat turn pipeline
//!
//! External systems are replaced with in-process fakes:
//! - LLM: `MockProvider` with queued replies
//! - Sidecar: records which endpoint was hit
//! - Passage index: fixed passages

use async_trait::async_trait;
use parentline_core::chat::{APOLOGY_MESSAGE, SourceCitation};
use parentline_core::{
    Backend, ChatService, Classifier, ConversationSession, Error, GenerationHandler, MemoryStore,
    PassageIndex, RetrievalHandler, RetrievedPassage, Result, RouteTable, SessionKind,
    SessionStatus, SessionStore, Sidecar, SidecarEndpoint, SidecarReply, Turn, TurnRole,
};
use parentline_llm::{Error as LlmError, MockProvider};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct FakeSidecar {
    calls: Mutex<Vec<SidecarEndpoint>>,
    fail: bool,
}

#[async_trait]
impl Sidecar for FakeSidecar {
    async fn ask(&self, endpoint: SidecarEndpoint, message: &str) -> Result<SidecarReply> {
        self.calls.lock().unwrap().push(endpoint);
        if self.fail {
            return Err(Error::Sidecar("connection refused".to_string()));
        }
        Ok(SidecarReply {
            response: format!("{} answer to: {}", endpoint.path(), message),
            sources: vec![SourceCitation::default()],
        })
    }
}

struct FakeIndex(Vec<RetrievedPassage>);

#[async_trait]
impl PassageIndex for FakeIndex {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

/// A store whose backend is always down
struct DownStore;

#[async_trait]
impl SessionStore for DownStore {
    async fn get(&self, _id: &str) -> Result<Option<ConversationSession>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn put(&self, _session: &ConversationSession) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn append(&self, _id: &str, _turns: Vec<Turn>) -> Result<ConversationSession> {
        panic!("append must not be called when the store is down")
    }
    async fn clear(&self, _id: &str) -> Result<bool> {
        Err(Error::Store("connection refused".into()))
    }
    async fn touch(&self, _id: &str) -> Result<bool> {
        Err(Error::Store("connection refused".into()))
    }
    async fn set_status(
        &self,
        _id: &str,
        _status: SessionStatus,
    ) -> Result<Option<ConversationSession>> {
        Err(Error::Store("connection refused".into()))
    }
    async fn mark_user_sessions_disconnected(&self, _user_id: &str, _keep: &str) -> Result<usize> {
        Err(Error::Store("connection refused".into()))
    }
    async fn ping(&self) -> Result<()> {
        Err(Error::Store("connection refused".into()))
    }
    async fn cleanup_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

struct Harness {
    service: ChatService,
    llm: MockProvider,
    sidecar: Arc<FakeSidecar>,
}

fn harness_with(
    store: Arc<dyn SessionStore>,
    sidecar: FakeSidecar,
    passages: Vec<RetrievedPassage>,
) -> Harness {
    harness_routed(store, sidecar, passages, RouteTable::default())
}

fn harness_routed(
    store: Arc<dyn SessionStore>,
    sidecar: FakeSidecar,
    passages: Vec<RetrievedPassage>,
    routes: RouteTable,
) -> Harness {
    let llm = MockProvider::new();
    let sidecar = Arc::new(sidecar);
    let generation = Arc::new(GenerationHandler::new(Arc::new(llm.clone()), "", 10));
    let retrieval = RetrievalHandler::new(
        Arc::new(FakeIndex(passages)),
        generation.clone(),
        5,
        4000,
    );
    let service = ChatService::new(
        store,
        Classifier::new(Arc::new(llm.clone()), ""),
        sidecar.clone(),
        retrieval,
        generation,
        routes,
        10,
    );
    Harness {
        service,
        llm,
        sidecar,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(MemoryStore::new_unsafe(3600, 50)),
        FakeSidecar::default(),
        Vec::new(),
    )
}

#[tokio::test]
async fn sleep_question_goes_to_tuning_sidecar_and_is_recorded() {
    let h = harness();
    let session = h
        .service
        .create_session(SessionKind::AiExpert, None, None)
        .await
        .unwrap();
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "sleep"}"#);

    let reply = h
        .service
        .handle_turn(&session.id, "My 4 month old wakes every hour")
        .await
        .unwrap();

    assert_eq!(reply.category, "sleep");
    assert!(reply.text.starts_with("/tuning answer"));
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(*h.sidecar.calls.lock().unwrap(), vec![SidecarEndpoint::Tuning]);

    let history = h.service.history(&session.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, TurnRole::User);
    assert_eq!(history[1].category.as_deref(), Some("sleep"));
}

#[tokio::test]
async fn general_question_uses_generation() {
    let h = harness();
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "other"}"#);
    h.llm.push_reply("Offer small portions and stay patient.");

    let reply = h.service.handle_turn("fresh", "Picky eater tips?").await.unwrap();
    assert_eq!(reply.text, "Offer small portions and stay patient.");
    assert_eq!(reply.category, "general");
    assert!(h.sidecar.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn off_topic_gets_redirect_and_fixed_text_on_failure() {
    let h = harness();
    h.llm.push_reply(r#"{"is_parenting": false}"#);
    h.llm.push_error(LlmError::Timeout(20_000));

    let reply = h.service.handle_turn("s1", "Who won the match?").await.unwrap();
    assert_eq!(reply.category, "off_topic");
    assert!(reply.text.contains("parenting"));
    assert_ne!(reply.text, APOLOGY_MESSAGE);
}

#[tokio::test]
async fn backend_failure_yields_apology_and_session_stays_usable() {
    let h = harness_with(
        Arc::new(MemoryStore::new_unsafe(3600, 50)),
        FakeSidecar {
            fail: true,
            ..Default::default()
        },
        Vec::new(),
    );
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "development"}"#);
    let reply = h.service.handle_turn("s2", "When do babies crawl?").await.unwrap();
    assert_eq!(reply.text, APOLOGY_MESSAGE);

    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "other"}"#);
    h.llm.push_reply("Here is a bath routine.");
    let reply = h.service.handle_turn("s2", "Bath routine?").await.unwrap();
    assert_eq!(reply.text, "Here is a bath routine.");
    assert_eq!(h.service.history("s2").await.unwrap().len(), 4);
}

#[tokio::test]
async fn doc_session_skips_classification() {
    let passage = RetrievedPassage {
        content: "Most babies sit unsupported around 6 months.".into(),
        category: "Development".into(),
        section: "Motor skills".into(),
        score: 0.8,
    };
    let h = harness_with(
        Arc::new(MemoryStore::new_unsafe(3600, 50)),
        FakeSidecar::default(),
        vec![passage],
    );
    let session = h
        .service
        .create_session(SessionKind::Doc, None, None)
        .await
        .unwrap();
    h.llm.push_reply("Around six months.");

    let reply = h
        .service
        .handle_turn(&session.id, "When do babies sit?")
        .await
        .unwrap();
    assert_eq!(reply.text, "Around six months.");
    assert_eq!(reply.category, "document");
    assert_eq!(reply.session_kind, SessionKind::Doc);
    assert_eq!(reply.sources[0].section, "Motor skills");
    assert_eq!(h.llm.call_count(), 1);
}

#[tokio::test]
async fn store_outage_degrades_to_stateless_turn() {
    let h = harness_with(Arc::new(DownStore), FakeSidecar::default(), Vec::new());
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "other"}"#);
    h.llm.push_reply("Stateless answer.");

    let reply = h.service.handle_turn("any", "Teething remedies?").await.unwrap();
    assert_eq!(reply.text, "Stateless answer.");
}

#[tokio::test]
async fn store_outage_keeps_doc_session_on_retrieval() {
    let passage = RetrievedPassage {
        content: "Start tummy time from the first days home.".into(),
        category: "Development".into(),
        section: "Tummy time".into(),
        score: 0.7,
    };
    let h = harness_with(Arc::new(DownStore), FakeSidecar::default(), vec![passage]);
    h.llm.push_reply("A few minutes a day is enough.");

    let reply = h
        .service
        .handle_turn_as("doc-session", SessionKind::Doc, "When to start tummy time?")
        .await
        .unwrap();
    assert_eq!(reply.text, "A few minutes a day is enough.");
    assert_eq!(reply.category, "document");
    assert_eq!(reply.session_kind, SessionKind::Doc);
    assert_eq!(h.llm.call_count(), 1);
    assert!(h.sidecar.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn stored_kind_wins_over_caller_hint() {
    let h = harness();
    let session = h
        .service
        .create_session(SessionKind::AiExpert, None, None)
        .await
        .unwrap();
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "sleep"}"#);

    let reply = h
        .service
        .handle_turn_as(&session.id, SessionKind::Doc, "Nap schedule?")
        .await
        .unwrap();
    assert_eq!(reply.session_kind, SessionKind::AiExpert);
    assert_eq!(reply.category, "sleep");
}

#[tokio::test]
async fn openai_backend_calls_openai_sidecar() {
    let routes = RouteTable {
        general: Backend::Openai,
        doc: Backend::Vector,
        ..RouteTable::default()
    };
    let h = harness_routed(
        Arc::new(MemoryStore::new_unsafe(3600, 50)),
        FakeSidecar::default(),
        Vec::new(),
        routes,
    );
    h.llm.push_reply(r#"{"is_parenting": true}"#);
    h.llm.push_reply(r#"{"category": "other"}"#);

    let reply = h.service.handle_turn("s3", "Screen time rules?").await.unwrap();
    assert!(reply.text.starts_with("/openai answer"));

    let doc = h
        .service
        .create_session(SessionKind::Doc, None, None)
        .await
        .unwrap();
    let reply = h.service.handle_turn(&doc.id, "Weaning guide?").await.unwrap();
    assert!(reply.text.starts_with("/vector answer"));

    assert_eq!(
        *h.sidecar.calls.lock().unwrap(),
        vec![SidecarEndpoint::Openai, SidecarEndpoint::Vector]
    );
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let h = harness();
    assert!(matches!(
        h.service.handle_turn("s", "   ").await,
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn session_lifecycle() {
    let h = harness();
    let first = h
        .service
        .create_session(SessionKind::AiExpert, Some("sleep".into()), Some("u1".into()))
        .await
        .unwrap();
    h.service.connect(&first.id).await.unwrap();

    let second = h
        .service
        .create_session(SessionKind::AiExpert, None, Some("u1".into()))
        .await
        .unwrap();

    let first_now = h.service.session(&first.id).await.unwrap().unwrap();
    assert_eq!(first_now.status, SessionStatus::Disconnected);
    assert_eq!(first_now.connection_attempts, 1);

    let connected = h.service.connect(&second.id).await.unwrap();
    assert_eq!(connected.status, SessionStatus::Connected);
    assert!(ChatService::welcome_message(&first_now).contains("sleep"));

    assert!(matches!(
        h.service.connect("missing").await,
        Err(Error::SessionNotFound(_))
    ));

    h.service.disconnect(&second.id).await.unwrap();
    let after = h.service.session(&second.id).await.unwrap().unwrap();
    assert!(after.disconnected_at.is_some());
}

#[tokio::test]
async fn route_table_can_send_sleep_to_vector() {
    let mut routes = RouteTable::default();
    routes.sleep = Backend::Vector;
    routes.general = Backend::Openai;
    let json = serde_json::to_value(&routes).unwrap();
    assert_eq!(json["sleep"], "vector");
    assert_eq!(json["general"], "openai");
    let parsed: RouteTable = serde_json::from_str(r#"{"general": "retrieval"}"#).unwrap();
    assert_eq!(parsed.general, Backend::Retrieval);
    assert_eq!(parsed.sleep, Backend::Tuning);
}

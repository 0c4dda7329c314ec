//! In-process application state for handler tests

use async_trait::async_trait;
use parentline_core::{
    ChatService, Classifier, Error, GenerationHandler, MemoryStore, OAuthProvider, PassageIndex,
    ProfileFetcher, Result, RetrievalHandler, RetrievedPassage, RouteTable, Sidecar,
    SidecarEndpoint, SidecarReply, SocialProfile,
};
use parentline_llm::MockProvider;
use parentline_store::{Child, Gender, NewChild, SocialSignup, Store, User};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use super::state::AppState;
use crate::middleware::auth::RequireAuth;
use crate::server::config::AuthConfig;

pub const BAD_PROVIDER_TOKEN: &str = "expired-provider-token";

pub struct FakeSidecar;

#[async_trait]
impl Sidecar for FakeSidecar {
    async fn ask(&self, endpoint: SidecarEndpoint, message: &str) -> Result<SidecarReply> {
        Ok(SidecarReply {
            response: format!("{} answer to: {}", endpoint.path(), message),
            sources: Vec::new(),
        })
    }
}

pub struct EmptyIndex;

#[async_trait]
impl PassageIndex for EmptyIndex {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedPassage>> {
        Ok(Vec::new())
    }
}

/// Vouches for every token except [`BAD_PROVIDER_TOKEN`]
pub struct FakeProfiles;

#[async_trait]
impl ProfileFetcher for FakeProfiles {
    async fn fetch_profile(
        &self,
        provider: OAuthProvider,
        access_token: &str,
    ) -> Result<SocialProfile> {
        if access_token == BAD_PROVIDER_TOKEN {
            return Err(Error::OAuth("provider rejected the token".to_string()));
        }
        Ok(SocialProfile {
            provider,
            provider_id: Some(format!("{}-123", provider.as_str())),
            email: format!("{}@example.com", access_token),
            name: "Test Parent".to_string(),
            avatar: None,
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub llm: MockProvider,
    _dir: TempDir,
}

pub async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let store = Store::from_path(&dir.path().join("test_parentline.db"))
        .await
        .unwrap();

    let llm = MockProvider::new();
    let generation = Arc::new(GenerationHandler::new(Arc::new(llm.clone()), "", 10));
    let retrieval = RetrievalHandler::new(Arc::new(EmptyIndex), generation.clone(), 5, 4000);
    let chat = ChatService::new(
        Arc::new(MemoryStore::new_unsafe(3600, 50)),
        Classifier::new(Arc::new(llm.clone()), ""),
        Arc::new(FakeSidecar),
        retrieval,
        generation,
        RouteTable::default(),
        10,
    );

    TestApp {
        state: AppState {
            store,
            chat: Arc::new(chat),
            profiles: Arc::new(FakeProfiles),
            auth: AuthConfig::default(),
        },
        llm,
        _dir: dir,
    }
}

impl TestApp {
    pub async fn user(&self, email: &str) -> User {
        self.state
            .store
            .upsert_social_user(&SocialSignup {
                email: email.to_string(),
                name: "Test Parent".to_string(),
                profile_image: None,
                auth_provider: "google".to_string(),
                auth_provider_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn child(&self, user_id: Uuid, name: &str) -> Child {
        self.state
            .store
            .create_child(
                user_id,
                &NewChild {
                    name: name.to_string(),
                    birth_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                    gender: Some(Gender::Male),
                },
            )
            .await
            .unwrap()
    }
}

pub fn auth(user: &User) -> RequireAuth {
    RequireAuth(user.clone())
}

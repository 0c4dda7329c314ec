//! Shared handler state

use parentline_core::{ChatService, ProfileFetcher};
use parentline_store::Store;
use std::sync::Arc;

use crate::server::config::AuthConfig;

/// State shared by every REST and websocket handler
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub chat: Arc<ChatService>,
    pub profiles: Arc<dyn ProfileFetcher>,
    pub auth: AuthConfig,
}

//! Shared fixtures for integration tests
//!
//! Builds the full service graph over the in-memory store so tests exercise
//! the same code paths as the HTTP layer without a database.

#![allow(dead_code)]

use std::sync::Arc;

use social_graph_service::config::{FeedConfig, GraphConfig};
use social_graph_service::domain::{Account, PrivacyTier};
use social_graph_service::services::{NewPost, RegisterAccount};
use social_graph_service::{AppState, InMemorySocialStore, SocialStore};

pub fn memory_state() -> AppState {
    let store: Arc<dyn SocialStore> = Arc::new(InMemorySocialStore::new());
    AppState::new(store, &GraphConfig::default(), FeedConfig::default())
}

/// Retry budget large enough that contention tests never exhaust it.
pub fn contended_state() -> AppState {
    let store: Arc<dyn SocialStore> = Arc::new(InMemorySocialStore::new());
    let graph = GraphConfig {
        commit_max_retries: 50,
        commit_backoff_ms: 1,
    };
    AppState::new(store, &graph, FeedConfig::default())
}

pub async fn register(state: &AppState, username: &str, tier: PrivacyTier) -> Account {
    let request = RegisterAccount {
        username: username.to_string(),
        profile_pic: None,
        bio: None,
        privacy_tier: tier,
    };
    state
        .accounts
        .register(request)
        .await
        .expect("register account")
}

pub async fn reload(state: &AppState, id: uuid::Uuid) -> Account {
    state
        .store
        .get_account(id)
        .await
        .expect("store lookup")
        .expect("account exists")
}

pub fn post(content: &str, tier: PrivacyTier) -> NewPost {
    NewPost {
        content: content.to_string(),
        privacy_tier: Some(tier),
        ..Default::default()
    }
}

// ABOUTME: In-memory store backend for tests and local development
// ABOUTME: Mirrors the Postgres backend's contract, including unique-email violations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Latchkey Contributors

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewUser, OAuthClient, StoreError, StoreProvider, User};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    user_scopes: HashMap<Uuid, Vec<String>>,
    clients: HashMap<String, OAuthClient>,
    scopes: Vec<String>,
}

/// In-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a client directly, for tests and seeding
    pub async fn seed_client(&self, client: OAuthClient) {
        self.inner
            .write()
            .await
            .clients
            .insert(client.client_id.clone(), client);
    }

    /// Insert a user with a derived scope set, for tests and seeding
    pub async fn seed_user(&self, user: User, scopes: Vec<String>) {
        let mut inner = self.inner.write().await;
        inner.user_scopes.insert(user.id, scopes);
        inner.users.insert(user.id, user);
    }

    /// Register scope names for the metadata document, for tests and seeding
    pub async fn seed_scopes(&self, scopes: Vec<String>) {
        self.inner.write().await.scopes = scopes;
    }
}

#[async_trait]
impl StoreProvider for MemoryStore {
    async fn create_user(&self, new_user: &NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::UniqueViolation);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        inner.user_scopes.insert(user.id, Vec::new());

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn get_user_with_scopes(
        &self,
        id: Uuid,
    ) -> Result<Option<(User, Vec<String>)>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).map(|user| {
            let scopes = inner.user_scopes.get(&id).cloned().unwrap_or_default();
            (user.clone(), scopes)
        }))
    }

    async fn get_oauth_client(&self, client_id: &str) -> Result<Option<OAuthClient>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.clients.get(client_id).cloned())
    }

    async fn list_scopes(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.scopes.clone())
    }
}

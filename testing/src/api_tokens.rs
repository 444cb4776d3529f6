//! In-memory API tokens.

use chrono::{DateTime, Utc};
use helpdesk_core::api_token::{ApiToken, ApiTokenRepository, ApiTokenUserType, NewApiToken};
use helpdesk_core::{StoreError, StoreFuture};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct State {
    tokens: BTreeMap<i64, ApiToken>,
    next_id: i64,
}

/// Token store keyed by id.
#[derive(Clone, Debug, Default)]
pub struct InMemoryApiTokenStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryApiTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored record by id, including the hash.
    #[must_use]
    pub fn stored(&self, id: i64) -> Option<ApiToken> {
        self.state.read().unwrap().tokens.get(&id).cloned()
    }
}

fn newest_first(mut tokens: Vec<ApiToken>) -> Vec<ApiToken> {
    tokens.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    tokens
}

impl ApiTokenRepository for InMemoryApiTokenStore {
    fn insert<'a>(&'a self, token: &'a NewApiToken) -> StoreFuture<'a, ApiToken> {
        let stored = {
            let mut state = self.state.write().unwrap();
            state.next_id += 1;
            let stored = ApiToken {
                id: state.next_id,
                user_id: token.user_id,
                user_type: token.user_type,
                name: token.name.clone(),
                prefix: token.prefix.clone(),
                token_hash: token.token_hash.clone(),
                scopes: token.scopes.clone(),
                expires_at: token.expires_at,
                last_used_at: None,
                last_used_ip: None,
                rate_limit: token.rate_limit,
                created_at: token.created_at,
                created_by: token.created_by,
                revoked_at: None,
                revoked_by: None,
            };
            state.tokens.insert(stored.id, stored.clone());
            stored
        };
        Box::pin(async move { Ok(stored) })
    }

    fn get(&self, id: i64) -> StoreFuture<'_, Option<ApiToken>> {
        let token = self.stored(id);
        Box::pin(async move { Ok(token) })
    }

    fn by_prefix<'a>(&'a self, prefix: &'a str) -> StoreFuture<'a, Vec<ApiToken>> {
        let tokens = self
            .state
            .read()
            .unwrap()
            .tokens
            .values()
            .filter(|t| t.prefix == prefix)
            .cloned()
            .collect();
        Box::pin(async move { Ok(tokens) })
    }

    fn list_by_user(&self, user_id: i64, user_type: ApiTokenUserType) -> StoreFuture<'_, Vec<ApiToken>> {
        let tokens = self
            .state
            .read()
            .unwrap()
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && t.user_type == user_type && !t.is_revoked())
            .cloned()
            .collect();
        Box::pin(async move { Ok(newest_first(tokens)) })
    }

    fn list_all(&self, include_revoked: bool) -> StoreFuture<'_, Vec<ApiToken>> {
        let tokens = self
            .state
            .read()
            .unwrap()
            .tokens
            .values()
            .filter(|t| include_revoked || !t.is_revoked())
            .cloned()
            .collect();
        Box::pin(async move { Ok(newest_first(tokens)) })
    }

    fn revoke(&self, id: i64, revoked_by: i64, at: DateTime<Utc>) -> StoreFuture<'_, ()> {
        let result = {
            let mut state = self.state.write().unwrap();
            match state.tokens.get_mut(&id) {
                Some(token) if !token.is_revoked() => {
                    token.revoked_at = Some(at);
                    token.revoked_by = Some(revoked_by);
                    Ok(())
                }
                _ => Err(StoreError::not_found("api token", id)),
            }
        };
        Box::pin(async move { result })
    }

    fn touch<'a>(&'a self, id: i64, ip: Option<&'a str>, at: DateTime<Utc>) -> StoreFuture<'a, ()> {
        if let Some(token) = self.state.write().unwrap().tokens.get_mut(&id) {
            token.last_used_at = Some(at);
            token.last_used_ip = ip.map(ToString::to_string);
        }
        Box::pin(async { Ok(()) })
    }
}

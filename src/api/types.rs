//! Shared state for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use subtle::ConstantTimeEq;

use crate::api::error::ApiError;
use crate::auth::CredentialStore;
use crate::llm::{CompletionClient, GenerationOptions};
use crate::models::Role;
use crate::session::ConversationSession;
use crate::transcript::TranscriptStore;

/// Shared context for all routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub credentials: CredentialStore,
    pub transcripts: TranscriptStore,
    pub client: Arc<dyn CompletionClient>,
    pub options: GenerationOptions,
    pub tokens: Arc<Mutex<SessionTokenStore>>,
    sessions: Arc<Mutex<HashMap<String, Arc<Mutex<ConversationSession>>>>>,
}

impl ApiContext {
    pub fn new(
        credentials: CredentialStore,
        transcripts: TranscriptStore,
        client: Arc<dyn CompletionClient>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            credentials,
            transcripts,
            client,
            options,
            tokens: Arc::new(Mutex::new(SessionTokenStore::new())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get the live session for a user, loading the persisted
    /// transcript on first access. The per-session mutex serializes
    /// turns: one outstanding completion call per learner.
    pub fn session_for(
        &self,
        username: &str,
    ) -> Result<Arc<Mutex<ConversationSession>>, ApiError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| ApiError::Internal("session map lock".into()))?;
        Ok(sessions
            .entry(username.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationSession::load(
                    self.transcripts.clone(),
                    username,
                )))
            })
            .clone())
    }
}

/// Authenticated user context, injected into request extensions by the
/// auth middleware.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub username: String,
    pub role: Role,
    pub token: String,
}

/// In-memory bearer-token store. Tokens are held as SHA-256 hashes and
/// compared in constant time. One logical session per user: issuing a
/// token replaces any previous one for that username.
pub struct SessionTokenStore {
    entries: Vec<TokenEntry>,
}

struct TokenEntry {
    token_hash: [u8; 32],
    username: String,
    role: Role,
}

impl SessionTokenStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Issue a fresh token for a user, invalidating any previous one.
    pub fn issue(&mut self, username: &str, role: Role) -> String {
        self.entries.retain(|e| e.username != username);
        let token = generate_token();
        self.entries.push(TokenEntry {
            token_hash: hash_token(&token),
            username: username.to_string(),
            role,
        });
        token
    }

    /// Look up a presented token. Returns the owning user on a match.
    pub fn validate(&self, token: &str) -> Option<(String, Role)> {
        let presented = hash_token(token);
        self.entries
            .iter()
            .find(|e| e.token_hash.ct_eq(&presented).unwrap_u8() == 1)
            .map(|e| (e.username.clone(), e.role))
    }

    /// Invalidate a token (logout).
    pub fn revoke(&mut self, token: &str) {
        let presented = hash_token(token);
        self.entries
            .retain(|e| e.token_hash.ct_eq(&presented).unwrap_u8() == 0);
    }
}

impl Default for SessionTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a bearer token string using SHA-256.
fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates() {
        let mut store = SessionTokenStore::new();
        let token = store.issue("ida", Role::Child);
        let (username, role) = store.validate(&token).unwrap();
        assert_eq!(username, "ida");
        assert_eq!(role, Role::Child);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let store = SessionTokenStore::new();
        assert!(store.validate("made-up-token").is_none());
    }

    #[test]
    fn reissue_invalidates_previous_token() {
        let mut store = SessionTokenStore::new();
        let first = store.issue("ida", Role::Child);
        let second = store.issue("ida", Role::Child);
        assert!(store.validate(&first).is_none());
        assert!(store.validate(&second).is_some());
    }

    #[test]
    fn revoke_invalidates_token() {
        let mut store = SessionTokenStore::new();
        let token = store.issue("ida", Role::Child);
        store.revoke(&token);
        assert!(store.validate(&token).is_none());
    }

    #[test]
    fn tokens_are_unique_per_issue() {
        let mut store = SessionTokenStore::new();
        let a = store.issue("ida", Role::Child);
        let b = store.issue("ole", Role::Child);
        assert_ne!(a, b);
    }
}

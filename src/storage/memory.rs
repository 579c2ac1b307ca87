//! In-Memory Story Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral runs

use super::{is_valid_token, new_session_token, Session, StoryPart, StoryStorage};
use crate::error::{StoryError, StoryResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage using HashMap
/// Data is lost when process terminates
pub struct InMemoryStorage {
    sessions: Arc<RwLock<HashMap<String, BTreeMap<usize, String>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoryStorage for InMemoryStorage {
    async fn allocate(&self) -> StoryResult<Session> {
        let session = Session::new(new_session_token());
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(session.token()) {
            return Err(StoryError::Storage(format!(
                "session '{}' already allocated",
                session.token()
            )));
        }
        sessions.insert(session.token().to_string(), BTreeMap::new());

        tracing::debug!("[InMemoryStorage] Allocated session '{}'", session.token());
        Ok(session)
    }

    async fn write_part(&self, session: &Session, index: usize, content: &str) -> StoryResult<()> {
        let mut sessions = self.sessions.write().await;
        let parts = sessions.get_mut(session.token()).ok_or_else(|| {
            StoryError::Storage(format!("session '{}' is not allocated", session.token()))
        })?;
        parts.insert(index, content.to_string());

        tracing::debug!(
            "[InMemoryStorage] Saved part {} for session '{}'",
            index,
            session.token()
        );
        Ok(())
    }

    async fn read_parts(&self, token: &str) -> StoryResult<Vec<StoryPart>> {
        let sessions = self.sessions.read().await;
        let parts = sessions
            .get(token)
            .ok_or_else(|| StoryError::NotFound(token.to_string()))?;

        Ok(parts
            .iter()
            .map(|(index, content)| StoryPart {
                index: *index,
                content: content.clone(),
            })
            .collect())
    }

    async fn list_sessions(&self) -> StoryResult<Vec<String>> {
        let sessions = self.sessions.read().await;
        let mut tokens: Vec<String> = sessions.keys().cloned().collect();
        tokens.sort();
        Ok(tokens)
    }

    async fn exists(&self, token: &str) -> bool {
        is_valid_token(token) && self.sessions.read().await.contains_key(token)
    }

    async fn cleanup(&self, session: &Session) {
        let removed = self.sessions.write().await.remove(session.token());
        tracing::debug!(
            "[InMemoryStorage] Cleanup of session '{}' (present: {})",
            session.token(),
            removed.is_some()
        );
    }
}

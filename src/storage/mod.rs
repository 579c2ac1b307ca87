//! Story Session Storage
//!
//! Information Hiding:
//! - Backend layout (directories, maps) hidden behind trait
//! - Token generation centralised so every backend hands out unique sessions
//! - Cleanup never fails from the caller's point of view

use crate::error::StoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;

/// Handle to one allocated storage location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    created_at: SystemTime,
}

impl Session {
    pub(crate) fn new(token: String) -> Self {
        Self {
            token,
            created_at: SystemTime::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

/// One stored story segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPart {
    pub index: usize,
    pub content: String,
}

/// Time-ordered UUIDv7: millisecond timestamp plus random bits, unique across concurrent callers.
pub fn new_session_token() -> String {
    Uuid::now_v7().simple().to_string()
}

/// Artifact name for part `index` (1-based)
pub fn part_file_name(index: usize) -> String {
    format!("story-{}.txt", index)
}

pub(crate) fn parse_part_file_name(name: &str) -> Option<usize> {
    name.strip_prefix("story-")?
        .strip_suffix(".txt")?
        .parse()
        .ok()
}

/// Tokens are used as directory names; anything else could escape the root.
pub(crate) fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Per-session storage of generated story parts
#[async_trait]
pub trait StoryStorage: Send + Sync {
    /// Create a fresh, empty location under a new unique token
    async fn allocate(&self) -> StoryResult<Session>;

    /// Write (or overwrite) one part artifact. Single attempt.
    async fn write_part(&self, session: &Session, index: usize, content: &str) -> StoryResult<()>;

    /// Stored parts ordered by index; `NotFound` for unknown tokens
    async fn read_parts(&self, token: &str) -> StoryResult<Vec<StoryPart>>;

    async fn list_sessions(&self) -> StoryResult<Vec<String>>;

    async fn exists(&self, token: &str) -> bool;

    /// Remove the whole location. Idempotent; failures are logged, never returned.
    async fn cleanup(&self, session: &Session);
}

//! File System Story Storage
//!
//! Information Hiding:
//! - Directory layout hidden from users
//! - Parts are plain UTF-8 text files, one per index
//! - Removal errors are swallowed and logged

use super::{
    is_valid_token, new_session_token, parse_part_file_name, part_file_name, Session, StoryPart,
    StoryStorage,
};
use crate::error::{StoryError, StoryResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// File system storage - one directory per session
/// Parts are stored as {base_path}/{token}/story-{index}.txt
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: impl Into<PathBuf>) -> StoryResult<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            StoryError::storage(
                format!("failed to create storage root {:?}", base_path),
                e,
            )
        })?;

        tracing::debug!("[FileSystemStorage] Using storage root {:?}", base_path);
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory for `token`; deterministic, does not touch the disk
    pub fn session_dir(&self, token: &str) -> PathBuf {
        self.base_path.join(token)
    }
}

#[async_trait]
impl StoryStorage for FileSystemStorage {
    async fn allocate(&self) -> StoryResult<Session> {
        let session = Session::new(new_session_token());
        let path = self.session_dir(session.token());

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StoryError::storage(format!("failed to create storage root {:?}", self.base_path), e)
        })?;
        // create_dir, not create_dir_all: an existing directory means the token was reused
        fs::create_dir(&path).await.map_err(|e| {
            StoryError::storage(format!("failed to create session directory {:?}", path), e)
        })?;

        tracing::debug!(
            "[FileSystemStorage] Allocated session '{}' at {:?}",
            session.token(),
            path
        );
        Ok(session)
    }

    async fn write_part(&self, session: &Session, index: usize, content: &str) -> StoryResult<()> {
        let path = self.session_dir(session.token()).join(part_file_name(index));

        fs::write(&path, content).await.map_err(|e| {
            StoryError::storage(format!("failed to write part file {:?}", path), e)
        })?;

        tracing::debug!(
            "[FileSystemStorage] Saved part {} for session '{}' to {:?}",
            index,
            session.token(),
            path
        );
        Ok(())
    }

    async fn read_parts(&self, token: &str) -> StoryResult<Vec<StoryPart>> {
        if !is_valid_token(token) {
            return Err(StoryError::NotFound(token.to_string()));
        }

        let dir = self.session_dir(token);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoryError::NotFound(token.to_string()))
            }
            Err(e) => {
                return Err(StoryError::storage(
                    format!("failed to read session directory {:?}", dir),
                    e,
                ))
            }
        };

        let mut parts = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoryError::storage("failed to read directory entry", e))?
        {
            let name = entry.file_name();
            let Some(index) = name.to_str().and_then(parse_part_file_name) else {
                continue;
            };

            let content = fs::read_to_string(entry.path()).await.map_err(|e| {
                StoryError::storage(format!("failed to read part file {:?}", entry.path()), e)
            })?;
            parts.push(StoryPart { index, content });
        }

        parts.sort_by_key(|part| part.index);
        tracing::debug!(
            "[FileSystemStorage] Loaded {} parts for session '{}'",
            parts.len(),
            token
        );
        Ok(parts)
    }

    async fn list_sessions(&self) -> StoryResult<Vec<String>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .map_err(|e| StoryError::storage("failed to read storage root", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoryError::storage("failed to read directory entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(token) = entry.file_name().to_str().filter(|t| is_valid_token(t)) {
                sessions.push(token.to_string());
            }
        }

        sessions.sort();
        tracing::debug!("[FileSystemStorage] Listed {} sessions", sessions.len());
        Ok(sessions)
    }

    async fn exists(&self, token: &str) -> bool {
        is_valid_token(token) && fs::metadata(self.session_dir(token)).await.is_ok()
    }

    async fn cleanup(&self, session: &Session) {
        let path = self.session_dir(session.token());

        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::info!("[FileSystemStorage] Removed session directory {:?}", path);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    "[FileSystemStorage] Session '{}' already absent, nothing to remove",
                    session.token()
                );
            }
            Err(e) => {
                tracing::warn!(
                    "[FileSystemStorage] Error cleaning up directory {:?}: {}",
                    path,
                    e
                );
            }
        }
    }
}

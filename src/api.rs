//! Story service facade
//!
//! This module is the single entry point used by outer layers (HTTP routes, the CLI).
//! It hides pipeline construction and turns every outcome into a [`StoryResponse`].

use crate::config::Settings;
use crate::core::generation::{GenerationClient, HuggingFaceClient, TextGenerator};
use crate::error::{ErrorKind, StoryError, StoryResult};
use crate::pipeline::{Story, StoryPipeline};
use crate::storage::{FileSystemStorage, StoryPart, StoryStorage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const SUCCESS_MESSAGE: &str = "Story created successfully";

/// Structured result of `create_story`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StoryResponse {
    #[serde(rename_all = "camelCase")]
    Ok {
        message: String,
        session_token: String,
        source_url: String,
        parts: Vec<String>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl StoryResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self, StoryResponse::Ok { .. })
    }
}

impl From<StoryResult<Story>> for StoryResponse {
    fn from(result: StoryResult<Story>) -> Self {
        match result {
            Ok(story) => StoryResponse::Ok {
                message: SUCCESS_MESSAGE.to_string(),
                session_token: story.session_token,
                source_url: story.source_url,
                parts: story.parts,
            },
            Err(e) => StoryResponse::Error {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// A previously completed story read back from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredStory {
    pub session_token: String,
    pub parts: Vec<String>,
}

pub struct StoryService {
    pipeline: StoryPipeline,
}

impl StoryService {
    pub fn new(pipeline: StoryPipeline) -> Self {
        Self { pipeline }
    }

    /// Wire the Hugging Face backend and file system storage from settings
    pub async fn from_settings(
        settings: &Settings,
        api_token: Option<String>,
    ) -> StoryResult<Self> {
        let backend: Arc<dyn TextGenerator> =
            Arc::new(HuggingFaceClient::new(&settings.generation, api_token));
        let storage: Arc<dyn StoryStorage> =
            Arc::new(FileSystemStorage::new(&settings.storage.root).await?);

        Self::with_backend(settings, backend, storage)
    }

    pub fn with_backend(
        settings: &Settings,
        backend: Arc<dyn TextGenerator>,
        storage: Arc<dyn StoryStorage>,
    ) -> StoryResult<Self> {
        let generator = GenerationClient::from_config(backend, &settings.generation);
        let pipeline = StoryPipeline::new(generator, storage, settings.pipeline.clone())?;
        Ok(Self::new(pipeline))
    }

    pub async fn create_story(&self, raw_url: Option<&str>) -> StoryResponse {
        self.create_story_with_cancel(raw_url, &CancellationToken::new())
            .await
    }

    /// Cancelling `cancel` aborts the in-flight call, skips remaining parts
    /// and removes the session.
    pub async fn create_story_with_cancel(
        &self,
        raw_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> StoryResponse {
        let result = self.pipeline.run(raw_url, cancel).await;
        if let Err(e) = &result {
            tracing::error!("Error creating story: {}", e);
        }
        StoryResponse::from(result)
    }

    /// Sessions still being generated are reported as `NotFound`.
    pub async fn load_story(&self, session_token: &str) -> StoryResult<StoredStory> {
        let parts = self.pipeline.storage().read_parts(session_token).await?;
        if !self.is_complete(&parts) {
            tracing::debug!(
                "Session '{}' has {} of {} parts, not a finished story",
                session_token,
                parts.len(),
                self.pipeline.parts()
            );
            return Err(StoryError::NotFound(session_token.to_string()));
        }

        Ok(StoredStory {
            session_token: session_token.to_string(),
            parts: parts.into_iter().map(|p| p.content).collect(),
        })
    }

    /// Tokens of finished stories only
    pub async fn list_stories(&self) -> StoryResult<Vec<String>> {
        let storage = self.pipeline.storage();
        let mut finished = Vec::new();

        for token in storage.list_sessions().await? {
            match storage.read_parts(&token).await {
                Ok(parts) if self.is_complete(&parts) => finished.push(token),
                Ok(_) => {}
                // removed by a failing run since the listing
                Err(StoryError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(finished)
    }

    /// The last write of a run is part N, so a full 1..=N set only exists once it completed.
    fn is_complete(&self, parts: &[StoryPart]) -> bool {
        let total = self.pipeline.parts();
        parts.len() == total
            && parts
                .iter()
                .enumerate()
                .all(|(i, part)| part.index == i + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response_shape() {
        let response = StoryResponse::from(Ok(Story {
            session_token: "abc".to_string(),
            source_url: "https://example.com".to_string(),
            label: "example.com".to_string(),
            parts: vec!["one".to_string()],
        }));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["sessionToken"], "abc");
        assert_eq!(json["sourceUrl"], "https://example.com");
        assert_eq!(json["message"], SUCCESS_MESSAGE);
        assert_eq!(json["parts"][0], "one");
    }

    #[test]
    fn test_error_response_shape() {
        let response = StoryResponse::from(Err(StoryError::InvalidUrl(
            "URL parameter is required".to_string(),
        )));

        assert!(!response.is_ok());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "InvalidUrl");
        assert!(json["message"].as_str().unwrap().contains("required"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_story_hidden_until_completed() {
        use crate::core::generation::GenerationParams;
        use crate::error::AttemptError;
        use crate::storage::InMemoryStorage;
        use async_trait::async_trait;
        use tokio::time::{sleep, Duration};

        struct FixedGenerator;

        #[async_trait]
        impl TextGenerator for FixedGenerator {
            async fn generate(
                &self,
                _prompt: &str,
                _params: &GenerationParams,
            ) -> Result<String, AttemptError> {
                Ok("A short story that is definitely long enough.".to_string())
            }
        }

        let storage = Arc::new(InMemoryStorage::new());
        let service = Arc::new(
            StoryService::with_backend(
                &Settings::default(),
                Arc::new(FixedGenerator),
                storage.clone(),
            )
            .unwrap(),
        );

        let running = {
            let service = service.clone();
            tokio::spawn(async move { service.create_story(Some("https://example.com")).await })
        };

        // part 1 is written, the run is waiting before part 2
        sleep(Duration::from_secs(1)).await;
        let allocated = storage.list_sessions().await.unwrap();
        assert_eq!(allocated.len(), 1);
        assert_eq!(storage.read_parts(&allocated[0]).await.unwrap().len(), 1);

        assert!(service.list_stories().await.unwrap().is_empty());
        let err = service.load_story(&allocated[0]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let response = running.await.unwrap();
        assert!(response.is_ok());
        assert_eq!(service.list_stories().await.unwrap(), allocated);
        let stored = service.load_story(&allocated[0]).await.unwrap();
        assert_eq!(stored.parts.len(), 3);
    }

    #[test]
    fn test_zero_parts_settings_rejected() {
        use crate::core::generation::GenerationParams;
        use crate::error::AttemptError;
        use crate::storage::InMemoryStorage;
        use async_trait::async_trait;

        struct SilentGenerator;

        #[async_trait]
        impl TextGenerator for SilentGenerator {
            async fn generate(
                &self,
                _prompt: &str,
                _params: &GenerationParams,
            ) -> Result<String, AttemptError> {
                Err(AttemptError::MissingText)
            }
        }

        let mut settings = Settings::default();
        settings.pipeline.parts = 0;

        let err = StoryService::with_backend(
            &settings,
            Arc::new(SilentGenerator),
            Arc::new(InMemoryStorage::new()),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}

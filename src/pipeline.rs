//! Story Pipeline
//!
//! Information Hiding:
//! - Part sequencing, throttling and cleanup hidden behind `run`
//! - Storage and generation backends injected at construction
//!
//! A run moves through `Idle -> Validating -> Allocating -> Generating(1..N) -> Completed`
//! and drops to `Failed` from any step. Once a session is allocated, every failure path
//! removes its storage before the error is returned.

use crate::config::PipelineConfig;
use crate::core::generation::GenerationClient;
use crate::core::validator::{self, ValidUrl};
use crate::error::{StoryError, StoryResult};
use crate::storage::{Session, StoryStorage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    Allocating,
    Generating { part: usize, total: usize },
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("Idle"),
            PipelineState::Validating => f.write_str("Validating"),
            PipelineState::Allocating => f.write_str("Allocating"),
            PipelineState::Generating { part, total } => {
                write!(f, "Generating({}/{})", part, total)
            }
            PipelineState::Completed => f.write_str("Completed"),
            PipelineState::Failed => f.write_str("Failed"),
        }
    }
}

/// A completed story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub session_token: String,
    pub source_url: String,
    pub label: String,
    pub parts: Vec<String>,
}

pub fn build_prompt(part: usize, total: usize, label: &str) -> String {
    format!(
        "Write a creative story part {part}/{total} about {label}. \
         The story should be engaging and concise (about 50-75 words). \
         Focus on making it interesting and suitable for social media. \
         Story part {part}:"
    )
}

struct RunTracker {
    state: PipelineState,
}

impl RunTracker {
    fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        tracing::debug!("[StoryPipeline] {} -> {}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, err: &StoryError) {
        tracing::error!("[StoryPipeline] Failed in state {}: {}", self.state, err);
        self.state = PipelineState::Failed;
    }
}

pub struct StoryPipeline {
    generator: GenerationClient,
    storage: Arc<dyn StoryStorage>,
    config: PipelineConfig,
}

impl StoryPipeline {
    /// Fails with `InvalidConfig` when `config.parts` is zero.
    pub fn new(
        generator: GenerationClient,
        storage: Arc<dyn StoryStorage>,
        config: PipelineConfig,
    ) -> StoryResult<Self> {
        if config.parts == 0 {
            return Err(StoryError::InvalidConfig(
                "pipeline.parts must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            generator,
            storage,
            config,
        })
    }

    pub fn storage(&self) -> &Arc<dyn StoryStorage> {
        &self.storage
    }

    /// Number of parts in a completed story
    pub fn parts(&self) -> usize {
        self.config.parts
    }

    pub async fn run(
        &self,
        raw_url: Option<&str>,
        cancel: &CancellationToken,
    ) -> StoryResult<Story> {
        let mut tracker = RunTracker::new();

        tracker.advance(PipelineState::Validating);
        let url = validator::validate(raw_url).map_err(|e| {
            tracker.fail(&e);
            e
        })?;

        tracker.advance(PipelineState::Allocating);
        if cancel.is_cancelled() {
            let err = StoryError::Cancelled;
            tracker.fail(&err);
            return Err(err);
        }
        let session = self.storage.allocate().await.map_err(|e| {
            tracker.fail(&e);
            e
        })?;
        tracing::info!(
            "[StoryPipeline] Processing URL {} in session '{}'",
            url,
            session.token()
        );

        match self.generate_parts(&url, &session, &mut tracker, cancel).await {
            Ok(parts) => {
                tracker.advance(PipelineState::Completed);
                tracing::info!(
                    "[StoryPipeline] Story created in session '{}' ({} parts)",
                    session.token(),
                    parts.len()
                );
                Ok(Story {
                    session_token: session.token().to_string(),
                    source_url: url.as_str().to_string(),
                    label: url.label(),
                    parts,
                })
            }
            Err(e) => {
                tracker.fail(&e);
                self.storage.cleanup(&session).await;
                Err(e)
            }
        }
    }

    async fn generate_parts(
        &self,
        url: &ValidUrl,
        session: &Session,
        tracker: &mut RunTracker,
        cancel: &CancellationToken,
    ) -> StoryResult<Vec<String>> {
        let total = self.config.parts;
        let label = url.label();
        let delay = Duration::from_millis(self.config.part_delay_ms);
        let mut parts = Vec::with_capacity(total);

        for part in 1..=total {
            tracker.advance(PipelineState::Generating { part, total });

            let prompt = build_prompt(part, total, &label);
            let content = self.generator.generate(&prompt, cancel).await?;
            self.storage.write_part(session, part, &content).await?;
            tracing::info!(
                "[StoryPipeline] Saved part {}/{} for session '{}'",
                part,
                total,
                session.token()
            );
            parts.push(content);

            if part < total {
                tracing::debug!(
                    "[StoryPipeline] Waiting {}ms before part {}",
                    delay.as_millis(),
                    part + 1
                );
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(StoryError::Cancelled),
                    () = sleep(delay) => {}
                }
            }
        }

        Ok(parts)
    }
}

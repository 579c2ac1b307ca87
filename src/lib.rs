//! Storyline - turns a web URL into a short multi-part story
//!
//! The pipeline validates the URL, allocates an isolated storage session,
//! generates each part through a retrying text-generation client and
//! removes the session again if anything fails.

mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod storage;
pub mod utils;

pub mod api;
pub mod cli;

pub use api::*;
pub use crate::config::{GenerationConfig, LoggingConfig, PipelineConfig, Settings, StorageConfig};
pub use error::{AttemptError, ErrorKind, StoryError, StoryResult};
pub use pipeline::{PipelineState, Story, StoryPipeline};

pub use crate::core::generation::{
    GenerationClient, GenerationParams, HuggingFaceClient, RetryPolicy, TextGenerator,
};
pub use crate::core::validator::{extract_label, validate, ValidUrl};
pub use storage::{FileSystemStorage, InMemoryStorage, Session, StoryPart, StoryStorage};

pub use tokio_util::sync::CancellationToken;

mod settings;

pub use settings::{GenerationConfig, LoggingConfig, PipelineConfig, Settings, StorageConfig};

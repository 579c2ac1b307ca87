use anyhow::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co/models/facebook/opt-1.3b";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote text-generation endpoint and the fixed sampling parameters sent with every prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub do_sample: bool,
    pub return_full_text: bool,
    /// Total attempts per prompt, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub min_text_len: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub parts: usize,
    /// Pause between two consecutive parts; keeps us under the remote rate limit.
    pub part_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_new_tokens: 100,
            temperature: 0.7,
            top_p: 0.9,
            do_sample: true,
            return_full_text: false,
            max_attempts: 3,
            base_delay_ms: 1000,
            min_text_len: 10,
            request_timeout_secs: 60,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parts: 3,
            part_delay_ms: 30_000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "./stories".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            pipeline: PipelineConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Built-in defaults, then `config/<CONFIG_ENV>.toml`, then `APP__SECTION__KEY` variables.
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());

        let config = Config::builder()
            .set_default("generation.endpoint", DEFAULT_ENDPOINT)?
            .set_default("generation.max_new_tokens", 100)?
            .set_default("generation.temperature", 0.7)?
            .set_default("generation.top_p", 0.9)?
            .set_default("generation.do_sample", true)?
            .set_default("generation.return_full_text", false)?
            .set_default("generation.max_attempts", 3)?
            .set_default("generation.base_delay_ms", 1000)?
            .set_default("generation.min_text_len", 10)?
            .set_default("generation.request_timeout_secs", 60)?
            .set_default("pipeline.parts", 3)?
            .set_default("pipeline.part_delay_ms", 30_000)?
            .set_default("storage.root", "./stories")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Hugging Face token, if one is configured. Public models accept anonymous calls.
    pub fn api_token() -> Option<String> {
        env::var("HUGGING_FACE_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.generation.max_attempts == 0 {
            anyhow::bail!("generation.max_attempts must be at least 1");
        }
        if self.pipeline.parts == 0 {
            anyhow::bail!("pipeline.parts must be at least 1");
        }
        if self.storage.root.trim().is_empty() {
            anyhow::bail!("storage.root must not be empty");
        }
        Ok(())
    }
}

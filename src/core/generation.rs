//! Text Generation Client
//!
//! Information Hiding:
//! - Wire format of the inference API hidden inside `HuggingFaceClient`
//! - Retry, backoff and response validation hidden behind `GenerationClient::generate`
//! - Backends only report why a single attempt failed

use crate::config::GenerationConfig;
use crate::error::{AttemptError, StoryError, StoryResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Sampling parameters sent alongside every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub do_sample: bool,
    pub return_full_text: bool,
}

impl From<&GenerationConfig> for GenerationParams {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            do_sample: config.do_sample,
            return_full_text: config.return_full_text,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

/// A single, non-retried call to a text-generation backend
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AttemptError>;
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: &'a GenerationParams,
}

/// Hugging Face inference API backend
pub struct HuggingFaceClient {
    client: Client,
    endpoint: String,
    api_token: Option<String>,
    timeout_secs: u64,
}

impl HuggingFaceClient {
    pub fn new(config: &GenerationConfig, api_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_token,
            timeout_secs: config.request_timeout_secs,
        }
    }

    fn extract_text(body: &str) -> Result<String, AttemptError> {
        let data: Value =
            serde_json::from_str(body).map_err(|e| AttemptError::Decode(e.to_string()))?;

        match data.get(0).and_then(|first| first.get("generated_text")) {
            None | Some(Value::Null) => Err(AttemptError::MissingText),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Err(AttemptError::Decode(format!(
                "generated_text is not a string: {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, AttemptError> {
        let request = InferenceRequest {
            inputs: prompt,
            parameters: params,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request);

        if let Some(token) = &self.api_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AttemptError::Timeout(self.timeout_secs)
            } else {
                AttemptError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(AttemptError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::extract_text(&body)
    }
}

/// Bounded exponential backoff without jitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub min_text_len: usize,
}

impl RetryPolicy {
    /// Wait between attempt `attempt` and `attempt + 1` (attempts count from 1).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            min_text_len: config.min_text_len,
        }
    }
}

/// Retrying front-end over a [`TextGenerator`]; the only way the pipeline talks to the backend.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn TextGenerator>,
    params: GenerationParams,
    policy: RetryPolicy,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        params: GenerationParams,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            params,
            policy,
        }
    }

    pub fn from_config(backend: Arc<dyn TextGenerator>, config: &GenerationConfig) -> Self {
        Self::new(backend, GenerationParams::from(config), RetryPolicy::from(config))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn generate(&self, prompt: &str, cancel: &CancellationToken) -> StoryResult<String> {
        self.generate_with_attempts(prompt, self.policy.max_attempts, cancel)
            .await
    }

    pub async fn generate_with_attempts(
        &self,
        prompt: &str,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> StoryResult<String> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StoryError::Cancelled),
                result = self.backend.generate(prompt, &self.params) => result,
            };

            match outcome.and_then(|text| self.accept(text)) {
                Ok(text) => {
                    tracing::debug!(
                        "[GenerationClient] Attempt {}/{} produced {} characters",
                        attempt,
                        max_attempts,
                        text.chars().count()
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        "[GenerationClient] Attempt {}/{} failed: {}",
                        attempt,
                        max_attempts,
                        e
                    );
                    last_error = Some(e);
                }
            }

            if attempt == max_attempts {
                break;
            }

            let delay = self.policy.delay_after(attempt);
            tracing::info!(
                "[GenerationClient] Waiting {}ms before retry",
                delay.as_millis()
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StoryError::Cancelled),
                () = sleep(delay) => {}
            }
        }

        Err(StoryError::Generation {
            attempts: max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    fn accept(&self, text: String) -> Result<String, AttemptError> {
        let trimmed = text.trim();
        let len = trimmed.chars().count();
        if len < self.policy.min_text_len || trimmed.is_empty() {
            return Err(AttemptError::TooShort {
                len,
                min: self.policy.min_text_len,
            });
        }
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const STORY: &str = "A short story about example.com that is definitely long enough.";

    /// Replays scripted outcomes; repeats the last one once the script runs out.
    struct ScriptedGenerator {
        script: Mutex<VecDeque<Result<String, AttemptError>>>,
        fallback: fn() -> Result<String, AttemptError>,
        calls: AtomicU32,
    }

    impl ScriptedGenerator {
        fn new(
            script: Vec<Result<String, AttemptError>>,
            fallback: fn() -> Result<String, AttemptError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, AttemptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(self.fallback)
        }
    }

    fn unavailable() -> Result<String, AttemptError> {
        Err(AttemptError::Status {
            status: 503,
            body: "model is loading".to_string(),
        })
    }

    fn story() -> Result<String, AttemptError> {
        Ok(STORY.to_string())
    }

    fn client(backend: Arc<ScriptedGenerator>, policy: RetryPolicy) -> GenerationClient {
        GenerationClient::new(backend, GenerationParams::default(), policy)
    }

    fn policy(max_attempts: u32, base_delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            min_text_len: 10,
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = policy(5, 1000);
        assert_eq!(policy.delay_after(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(4000));
        // saturates instead of overflowing
        assert!(policy.delay_after(40) > policy.delay_after(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fails_twice_then_succeeds() {
        let backend = ScriptedGenerator::new(vec![unavailable(), unavailable()], story);
        let client = client(backend.clone(), policy(3, 1000));

        let start = tokio::time::Instant::now();
        let text = client.generate("prompt", &CancellationToken::new()).await.unwrap();
        let waited = start.elapsed();

        assert_eq!(text, STORY);
        assert_eq!(backend.calls(), 3);
        assert!(waited >= Duration::from_millis(3000));
        assert!(waited < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_stops_at_max_attempts() {
        let backend = ScriptedGenerator::new(vec![], unavailable);
        let client = client(backend.clone(), policy(3, 1000));

        let err = client.generate("prompt", &CancellationToken::new()).await.unwrap_err();

        assert_eq!(backend.calls(), 3);
        match err {
            StoryError::Generation { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_attempt_budget() {
        let backend = ScriptedGenerator::new(vec![], unavailable);
        let client = client(backend.clone(), policy(3, 10));

        let err = client
            .generate_with_attempts("prompt", 5, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(backend.calls(), 5);
        assert!(matches!(err, StoryError::Generation { attempts: 5, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_text_is_retried_and_result_trimmed() {
        let backend = ScriptedGenerator::new(
            vec![Ok("   tiny   ".to_string()), Ok(format!("\n  {}  \n", STORY))],
            story,
        );
        let client = client(backend.clone(), policy(3, 1000));

        let text = client.generate("prompt", &CancellationToken::new()).await.unwrap();

        assert_eq!(text, STORY);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let backend = ScriptedGenerator::new(vec![], unavailable);
        let client = client(backend.clone(), policy(3, 1000));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = client.generate("prompt", &cancel).await.unwrap_err();

        assert!(matches!(err, StoryError::Cancelled));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_huggingface_request_shape() {
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/opt"))
            .and(header("Authorization", "Bearer hf_test"))
            .and(body_partial_json(serde_json::json!({
                "inputs": "Tell a story",
                "parameters": {
                    "max_new_tokens": 100,
                    "do_sample": true,
                    "return_full_text": false
                }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "generated_text": STORY }])),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = GenerationConfig {
            endpoint: format!("{}/models/opt", mock_server.uri()),
            ..GenerationConfig::default()
        };
        let backend = HuggingFaceClient::new(&config, Some("hf_test".to_string()));

        let text = backend
            .generate("Tell a story", &GenerationParams::from(&config))
            .await
            .unwrap();
        assert_eq!(text, STORY);
    }

    #[tokio::test]
    async fn test_huggingface_error_status() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Model is currently loading"))
            .mount(&mock_server)
            .await;

        let config = GenerationConfig {
            endpoint: mock_server.uri(),
            ..GenerationConfig::default()
        };
        let backend = HuggingFaceClient::new(&config, None);

        match backend.generate("prompt", &GenerationParams::default()).await {
            Err(AttemptError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("loading"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_extract_text_rejects_bad_shapes() {
        assert!(matches!(
            HuggingFaceClient::extract_text("not json"),
            Err(AttemptError::Decode(_))
        ));
        assert!(matches!(
            HuggingFaceClient::extract_text("[]"),
            Err(AttemptError::MissingText)
        ));
        assert!(matches!(
            HuggingFaceClient::extract_text(r#"[{"other": "x"}]"#),
            Err(AttemptError::MissingText)
        ));
        assert!(matches!(
            HuggingFaceClient::extract_text(r#"[{"generated_text": 42}]"#),
            Err(AttemptError::Decode(_))
        ));
        assert_eq!(
            HuggingFaceClient::extract_text(r#"[{"generated_text": "hello"}]"#).unwrap(),
            "hello"
        );
    }

    #[tokio::test]
    async fn test_retries_against_http_backend() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{malformed"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{
                        "generated_text": format!("  {}  ", STORY)
                    }])),
            )
            .mount(&mock_server)
            .await;

        let config = GenerationConfig {
            endpoint: mock_server.uri(),
            base_delay_ms: 1,
            ..GenerationConfig::default()
        };
        let client = GenerationClient::from_config(
            Arc::new(HuggingFaceClient::new(&config, None)),
            &config,
        );

        let text = client.generate("prompt", &CancellationToken::new()).await.unwrap();
        assert_eq!(text, STORY);
    }
}

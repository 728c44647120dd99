//! OpenAI-compatible chat completions client with rate limiting and retries.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{GeneratorError, GeneratorResult};
use crate::domain::models::GeneratorConfig;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

/// Chat client shared by the LLM generator and planner.
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: GeneratorConfig,
    api_key: Option<String>,
    limiter: Arc<DirectLimiter>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Build a client, reading the API key from `config.api_key_env`.
    pub fn from_env(config: GeneratorConfig) -> GeneratorResult<Self> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        Self::new(config, api_key)
    }

    /// Client for `config` using `api_key` as given.
    pub fn new(config: GeneratorConfig, api_key: Option<String>) -> GeneratorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GeneratorError::NotConfigured(e.to_string()))?;

        let period = Duration::from_secs_f64(1.0 / config.requests_per_second.max(0.001));
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period)
            .ok_or_else(|| GeneratorError::NotConfigured("invalid request rate".to_string()))?
            .allow_burst(burst);

        Ok(Self {
            http,
            config,
            api_key,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    /// Model name sent with every request.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sampling temperature.
    pub fn temperature(&self) -> f32 {
        self.config.temperature
    }

    /// Send a system/user prompt pair and parse the reply as a JSON value.
    ///
    /// Transient failures are retried with exponential backoff up to
    /// `max_retries` times; a reply that is not JSON is not retried.
    pub async fn complete_json(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> GeneratorResult<serde_json::Value> {
        let text = self.complete(system, user, temperature).await?;
        let json = extract_json(&text);
        serde_json::from_str(json)
            .map_err(|e| GeneratorError::MalformedResponse(format!("invalid JSON: {e}")))
    }

    async fn complete(&self, system: &str, user: &str, temperature: f32) -> GeneratorResult<String> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        let attempts = AtomicU32::new(0);
        let max_retries = self.config.max_retries;

        backoff::future::retry(policy, || async {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed);
            match self.send_once(system, user, temperature).await {
                Ok(text) => Ok(text),
                Err(err) if err.is_transient() && attempt < max_retries => {
                    warn!(attempt = attempt + 1, error = %err, "transient generator error, retrying");
                    Err(backoff::Error::transient(err))
                }
                Err(err) => Err(backoff::Error::permanent(err)),
            }
        })
        .await
    }

    async fn send_once(&self, system: &str, user: &str, temperature: f32) -> GeneratorResult<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            GeneratorError::NotConfigured(format!("set {} to use the LLM generator", self.config.api_key_env))
        })?;

        self.limiter.until_ready().await;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: user.to_string(),
                },
            ],
            temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!(url = %url, model = %self.config.model, "sending chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GeneratorError::Timeout(self.config.request_timeout_secs)
                } else {
                    GeneratorError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::from_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::MalformedResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GeneratorError::MalformedResponse("response has no content".to_string()))
    }
}

/// Narrow a reply down to its JSON object, tolerating fences and chatter.
pub fn extract_json(response: &str) -> &str {
    let trimmed = strip_code_fences(response.trim());
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return trimmed;
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Remove a leading and trailing markdown fence line, if present.
pub fn strip_code_fences(content: &str) -> &str {
    let mut body = content;
    if body.trim_start().starts_with("```") {
        let start = body.trim_start();
        body = start.find('\n').map_or("", |nl| &start[nl + 1..]);
    }
    let end_trimmed = body.trim_end();
    if end_trimmed.ends_with("```") {
        let without = &end_trimmed[..end_trimmed.len() - 3];
        body = without.strip_suffix('\n').unwrap_or(without);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: String) -> GeneratorConfig {
        GeneratorConfig {
            base_url,
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            requests_per_second: 100.0,
            burst_size: 10,
            ..GeneratorConfig::default()
        }
    }

    fn completion(content: &str) -> String {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("Here you go: {\"a\": 1} done"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```python\nprint(1)\n```"), "print(1)");
        assert_eq!(strip_code_fences("print(1)\n"), "print(1)\n");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_not_retried() {
        let client = ChatClient::new(config("http://127.0.0.1:9".into()), None).unwrap();
        let err = client.complete_json("s", "u", 0.3).await.unwrap_err();
        assert!(matches!(err, GeneratorError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_parses_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(completion("{\"ok\": true}"))
            .create_async()
            .await;

        let client = ChatClient::new(config(server.url()), Some("test-key".into())).unwrap();
        let value = client.complete_json("s", "u", 0.3).await.unwrap();
        assert_eq!(value["ok"], serde_json::Value::Bool(true));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_gives_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .expect(3)
            .create_async()
            .await;

        let client = ChatClient::new(config(server.url()), Some("k".into())).unwrap();
        let err = client.complete_json("s", "u", 0.3).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Api { status: 503, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_permanent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let client = ChatClient::new(config(server.url()), Some("k".into())).unwrap();
        assert!(client.complete_json("s", "u", 0.3).await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_json_reply_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(completion("sorry, I cannot help"))
            .create_async()
            .await;

        let client = ChatClient::new(config(server.url()), Some("k".into())).unwrap();
        let err = client.complete_json("s", "u", 0.3).await.unwrap_err();
        assert!(matches!(err, GeneratorError::MalformedResponse(_)));
    }
}

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

use orderly_core::config::{LlmConfig, LlmProvider};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 2048;

/// Single-prompt completion over the provider's HTTP API.
///
/// Each call makes one request unless `llm.max_retries` is raised. A transport
/// failure then surfaces as a stage failure of the calling capability.
pub struct HttpLlmClient {
    http: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("failed to build llm http client")?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            http,
            provider: config.provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, prompt: &str) -> Result<Attempt> {
        let mut request = self
            .http
            .post(endpoint(self.provider, &self.base_url))
            .json(&request_body(self.provider, &self.model, prompt));

        let api_key = self.api_key.as_ref().map(|key| key.expose_secret().to_string());
        request = match (self.provider, api_key) {
            (LlmProvider::OpenAi, Some(key)) => request.bearer_auth(key),
            (LlmProvider::Anthropic, Some(key)) => {
                request.header("x-api-key", key).header("anthropic-version", ANTHROPIC_VERSION)
            }
            (_, _) => request,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(error) if error.is_timeout() || error.is_connect() => {
                return Ok(Attempt::Retry(anyhow!("llm request failed: {error}")));
            }
            Err(error) => return Err(anyhow!("llm request failed: {error}")),
        };

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            let body = response.text().await.unwrap_or_default();
            return Ok(Attempt::Retry(anyhow!("llm provider returned {status}: {body}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("llm provider returned {status}: {body}"));
        }

        let body: Value = response.json().await.context("llm response was not json")?;
        extract_text(self.provider, &body).map(Attempt::Done)
    }
}

enum Attempt {
    Done(String),
    Retry(anyhow::Error),
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut attempt = 0;
        loop {
            debug!(
                event_name = "llm.request.sent",
                correlation_id = "llm",
                provider = ?self.provider,
                model = %self.model,
                attempt,
                "sending llm request"
            );
            match self.send_once(prompt).await? {
                Attempt::Done(text) => return Ok(text),
                Attempt::Retry(error) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "llm.request.retry",
                        correlation_id = "llm",
                        attempt,
                        error = %error,
                        "retrying llm request"
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Attempt::Retry(error) => return Err(error),
            }
        }
    }
}

pub fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com/v1",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    }
}

fn endpoint(provider: LlmProvider, base_url: &str) -> String {
    match provider {
        LlmProvider::OpenAi => format!("{base_url}/chat/completions"),
        LlmProvider::Anthropic => format!("{base_url}/v1/messages"),
        LlmProvider::Ollama => format!("{base_url}/api/generate"),
    }
}

fn request_body(provider: LlmProvider, model: &str, prompt: &str) -> Value {
    match provider {
        LlmProvider::OpenAi => json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.0,
        }),
        LlmProvider::Anthropic => json!({
            "model": model,
            "max_tokens": ANTHROPIC_MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        }),
        LlmProvider::Ollama => json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0.0 },
        }),
    }
}

fn extract_text(provider: LlmProvider, body: &Value) -> Result<String> {
    let text = match provider {
        LlmProvider::OpenAi => body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string),
        LlmProvider::Anthropic => body.get("content").and_then(Value::as_array).map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        }),
        LlmProvider::Ollama => body.get("response").and_then(Value::as_str).map(str::to_string),
    };

    text.ok_or_else(|| anyhow!("llm response did not contain completion text"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use secrecy::SecretString;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use orderly_core::config::{AppConfig, LlmConfig, LlmProvider, RendererKind};

    use super::{endpoint, extract_text, request_body, HttpLlmClient, LlmClient};

    /// Local endpoint answering every request with 503. Returns its url and a request counter.
    async fn unavailable_provider() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local addr");
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let mut received = Vec::new();
                let mut buffer = [0_u8; 4096];
                while let Ok(read) = socket.read(&mut buffer).await {
                    if read == 0 {
                        break;
                    }
                    received.extend_from_slice(&buffer[..read]);
                    if request_complete(&received) {
                        break;
                    }
                }
                let _ = socket
                    .write_all(
                        b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 4\r\nconnection: close\r\n\r\nbusy",
                    )
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{address}"), requests)
    }

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        received.len() >= header_end + 4 + content_length
    }

    fn config(provider: LlmProvider, base_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some(SecretString::from("sk-test".to_string())),
            base_url: base_url.map(str::to_string),
            model: "test-model".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            renderer: RendererKind::Llm,
        }
    }

    #[test]
    fn base_url_defaults_per_provider_and_drops_trailing_slash() {
        let client = HttpLlmClient::from_config(&config(LlmProvider::Anthropic, None)).expect("client");
        assert_eq!(client.base_url, "https://api.anthropic.com");

        let client = HttpLlmClient::from_config(&config(
            LlmProvider::Ollama,
            Some("http://gpu-box:11434/"),
        ))
        .expect("client");
        assert_eq!(client.base_url, "http://gpu-box:11434");
        assert_eq!(endpoint(client.provider(), &client.base_url), "http://gpu-box:11434/api/generate");
    }

    #[test]
    fn request_bodies_carry_model_and_prompt() {
        let openai = request_body(LlmProvider::OpenAi, "gpt", "hello");
        assert_eq!(openai["messages"][0]["content"], "hello");
        assert_eq!(openai["model"], "gpt");

        let anthropic = request_body(LlmProvider::Anthropic, "claude", "hello");
        assert_eq!(anthropic["messages"][0]["role"], "user");
        assert!(anthropic["max_tokens"].as_u64().is_some());

        let ollama = request_body(LlmProvider::Ollama, "llama", "hello");
        assert_eq!(ollama["prompt"], "hello");
        assert_eq!(ollama["stream"], false);
    }

    #[test]
    fn completion_text_is_read_from_provider_shapes() {
        let openai = json!({ "choices": [{ "message": { "role": "assistant", "content": "A" } }] });
        assert_eq!(extract_text(LlmProvider::OpenAi, &openai).expect("openai"), "A");

        let anthropic = json!({ "content": [
            { "type": "text", "text": "B1" },
            { "type": "tool_use", "id": "x" },
            { "type": "text", "text": "B2" }
        ] });
        assert_eq!(extract_text(LlmProvider::Anthropic, &anthropic).expect("anthropic"), "B1B2");

        let ollama = json!({ "model": "llama", "response": "C", "done": true });
        assert_eq!(extract_text(LlmProvider::Ollama, &ollama).expect("ollama"), "C");

        assert!(extract_text(LlmProvider::OpenAi, &json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn default_config_makes_one_request_per_call() {
        let (base_url, requests) = unavailable_provider().await;
        let mut llm = AppConfig::default().llm;
        llm.base_url = Some(base_url);
        llm.timeout_secs = 5;

        let client = HttpLlmClient::from_config(&llm).expect("client");
        let error = client.complete("extract this").await.expect_err("provider is unavailable");

        assert!(error.to_string().contains("503"), "{error}");
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_happen_only_when_configured() {
        let (base_url, requests) = unavailable_provider().await;
        let mut llm = config(LlmProvider::Ollama, Some(&base_url));
        llm.max_retries = 1;

        let client = HttpLlmClient::from_config(&llm).expect("client");
        assert!(client.complete("extract this").await.is_err());
        assert_eq!(requests.load(Ordering::SeqCst), 2);
    }
}

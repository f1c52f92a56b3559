//! Text-generation backend.
//!
//! Stages talk to the model through `TextBackend` so the pipeline can run
//! against a local Ollama server or an in-process fake. The Ollama client is
//! blocking: one `/api/chat` round trip per stage, bounded by the configured
//! global timeout, never retried.
use crate::config::BackendConfig;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// One stage's request: persona plus the fully rendered prompt.
#[derive(Debug, Clone, Copy)]
pub struct StageRequest<'a> {
    pub role: &'a str,
    pub system: &'a str,
    pub prompt: &'a str,
}

/// Transport-level failures. Any of these make the backend unavailable for
/// the run.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to {url} failed: {detail}")]
    Transport { url: String, detail: String },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unreadable response from {url}: {detail}")]
    Decode { url: String, detail: String },
}

pub trait TextBackend {
    /// Generate free text for a single stage.
    fn generate(&self, request: &StageRequest<'_>) -> Result<String, BackendError>;

    /// Model identifier recorded in run logs.
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Blocking client for Ollama's chat endpoint.
pub struct OllamaBackend {
    agent: ureq::Agent,
    chat_url: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(config: &BackendConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            chat_url: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

impl TextBackend for OllamaBackend {
    fn generate(&self, request: &StageRequest<'_>) -> Result<String, BackendError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.chat_url)
            .send_json(&body)
            .map_err(|err| match err {
                ureq::Error::StatusCode(status) => BackendError::Status {
                    url: self.chat_url.clone(),
                    status,
                },
                other => BackendError::Transport {
                    url: self.chat_url.clone(),
                    detail: other.to_string(),
                },
            })?;
        let parsed: ChatResponse =
            response
                .body_mut()
                .read_json()
                .map_err(|err| BackendError::Decode {
                    url: self.chat_url.clone(),
                    detail: err.to_string(),
                })?;

        tracing::info!(
            role = request.role,
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = request.prompt.len(),
            response_bytes = parsed.message.content.len(),
            "backend call complete"
        );
        Ok(parsed.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn chat_request_matches_ollama_wire_format() {
        let body = ChatRequest {
            model: "llama3.2:1b",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "You are a tester.",
                },
                ChatMessage {
                    role: "user",
                    content: "Say hi.",
                },
            ],
            stream: false,
            options: ChatOptions { temperature: 0.5 },
        };
        let value = serde_json::to_value(&body).expect("serialize chat request");
        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama3.2:1b",
                "messages": [
                    {"role": "system", "content": "You are a tester."},
                    {"role": "user", "content": "Say hi."}
                ],
                "stream": false,
                "options": {"temperature": 0.5}
            })
        );
    }

    #[test]
    fn chat_response_reads_message_content() {
        let raw = r#"{"model":"llama3.2:1b","created_at":"2024-01-01T00:00:00Z",
            "message":{"role":"assistant","content":"hello"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).expect("parse chat response");
        assert_eq!(parsed.message.content, "hello");
    }

    #[test]
    fn chat_url_tolerates_trailing_slash() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:11434/".to_string(),
            ..BackendConfig::default()
        };
        let backend = OllamaBackend::new(&config);
        assert_eq!(backend.chat_url, "http://127.0.0.1:11434/api/chat");
        assert_eq!(backend.model(), config.model);
    }

    #[test]
    fn unreachable_backend_is_a_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind unused port");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let config = BackendConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            timeout_secs: 5,
            ..BackendConfig::default()
        };
        let backend = OllamaBackend::new(&config);
        let err = backend
            .generate(&StageRequest {
                role: "Tester",
                system: "You are a tester.",
                prompt: "Say hi.",
            })
            .expect_err("closed port must fail");
        assert!(matches!(err, BackendError::Transport { .. }), "{err}");
    }
}

//! Ollama chat client for noise diagnostics.
//!
//! Sends one non-streaming chat request per diagnostic, retrying
//! transient failures a bounded number of times.

use super::prompt::{build_system_prompt, USER_PROMPT};
use super::{DiagnosticError, DiagnosticRequest, Diagnostician};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the diagnostic client.
#[derive(Debug, Clone)]
pub struct DiagnosticConfig {
    pub ollama_url: String,
    pub model_name: String,
    /// Bearer token for hosted endpoints.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Extra attempts after the first one.
    pub retries: usize,
    /// Base delay between attempts; grows linearly.
    pub retry_delay: Duration,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_seconds: 300,
            retries: 2,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl From<&crate::config::ModelConfig> for DiagnosticConfig {
    fn from(config: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: config.ollama_url.clone(),
            model_name: config.name.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            timeout_seconds: config.timeout_seconds,
            retries: config.retries,
            ..Self::default()
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

/// Diagnostician backed by an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaDiagnostician {
    config: DiagnosticConfig,
    http_client: reqwest::Client,
}

impl OllamaDiagnostician {
    pub fn new(config: DiagnosticConfig) -> Result<Self, DiagnosticError> {
        info!(
            "Initializing diagnostician with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn chat_request(&self, request: &DiagnosticRequest) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(request),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: USER_PROMPT.to_string(),
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }

    async fn send_once(&self, body: &OllamaChatRequest) -> Result<String, DiagnosticError> {
        let url = format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'));

        let mut builder = self.http_client.post(&url).json(body);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                DiagnosticError::Timeout(self.config.timeout_seconds)
            } else if e.is_connect() {
                DiagnosticError::Connect(self.config.ollama_url.clone())
            } else {
                DiagnosticError::Request(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DiagnosticError::Api { status, body });
        }

        let chat_response: OllamaChatResponse = response.json().await?;
        let content = chat_response.message.content.trim().to_string();
        if content.is_empty() {
            return Err(DiagnosticError::EmptyResponse);
        }

        Ok(content)
    }
}

#[async_trait]
impl Diagnostician for OllamaDiagnostician {
    async fn diagnose(&self, request: &DiagnosticRequest) -> Result<String, DiagnosticError> {
        let body = self.chat_request(request);
        let mut attempt = 0;

        loop {
            debug!("Diagnostic request attempt {}", attempt + 1);

            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay * attempt as u32;
                    warn!(
                        "Diagnostic attempt {} failed ({}), retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DiagnosticRequest {
        DiagnosticRequest {
            context: "guidelines".to_string(),
            aggregated_json: "{}".to_string(),
            accommodation: None,
        }
    }

    #[test]
    fn test_diagnostic_config_default() {
        let config = DiagnosticConfig::default();
        assert_eq!(config.model_name, "llama3.2:latest");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_chat_request_shape() {
        let diagnostician = OllamaDiagnostician::new(DiagnosticConfig::default()).unwrap();
        let body = diagnostician.chat_request(&request());
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "llama3.2:latest");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], USER_PROMPT);
    }

    #[test]
    fn test_unreachable_server_is_connect_error() {
        let config = DiagnosticConfig {
            // Port 9 (discard) on localhost is not expected to accept HTTP.
            ollama_url: "http://127.0.0.1:9".to_string(),
            timeout_seconds: 5,
            retries: 0,
            ..DiagnosticConfig::default()
        };
        let diagnostician = OllamaDiagnostician::new(config).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        let err = runtime.block_on(diagnostician.diagnose(&request())).unwrap_err();
        assert!(matches!(
            err,
            DiagnosticError::Connect(_)
                | DiagnosticError::Timeout(_)
                | DiagnosticError::Request(_)
        ));
    }
}

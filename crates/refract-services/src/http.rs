//! HTTP generation client against an OpenAI-compatible chat endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::generation::{GenerationService, PromptKind, ServiceError};

const MAX_INPUT_LOG_CHARS: usize = 2_000;

/// HTTP client config (OpenAI-compatible)
#[derive(Debug, Clone)]
pub struct HttpGenerationConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for HttpGenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            timeout_secs: 30,
        }
    }
}

/// GenerationService backed by an OpenAI-compatible chat API.
pub struct HttpGenerationClient {
    client: reqwest::Client,
    config: HttpGenerationConfig,
}

impl HttpGenerationClient {
    pub fn new(config: HttpGenerationConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn system_prompt(kind: PromptKind) -> &'static str {
        match kind {
            PromptKind::Plan => {
                "You are a content pipeline planner. Return ONLY one JSON object: \
                 {\"steps\":[{\"stage\":\"ingest|generate|review|publish\",\"target\":null|\"name\"}]}."
            }
            PromptKind::Ingest => {
                "You are a content analyst. Return ONLY one JSON object: \
                 {\"themes\":[],\"keywords\":[],\"sentiment\":\"positive|negative|neutral\",\
                 \"audience\":\"\",\"key_messages\":[]}."
            }
            PromptKind::Generate => {
                "You adapt source content for one platform. Respect the style directive and the \
                 character ceiling in the input. Return plain text only, no code fences."
            }
            PromptKind::Review => {
                "You score brand consistency. Return ONLY one JSON object with 0-100 integers: \
                 {\"tone\":0,\"values\":0,\"keywords\":0,\"forbidden\":0,\"audience\":0}."
            }
            PromptKind::Reflect => {
                "You diagnose content quality failures. Return ONLY one JSON object: \
                 {\"can_remediate\":true,\"root_cause\":\"\",\"strategy\":\"\",\"focus_areas\":[]}."
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[async_trait]
impl GenerationService for HttpGenerationClient {
    async fn invoke(&self, kind: PromptKind, input: Value) -> Result<String, ServiceError> {
        let user = serde_json::to_string(&input)
            .map_err(|e| ServiceError::Serialization(e.to_string()))?;
        debug!(
            kind = %kind,
            model = %self.config.model,
            input_preview = %truncate_for_log(&user, MAX_INPUT_LOG_CHARS),
            "generation request prepared"
        );

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            let value = format!("Bearer {}", key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&value).map_err(|e| ServiceError::Http(e.to_string()))?,
            );
        }

        let body = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt(kind).to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(self.config.timeout_secs)
                } else {
                    ServiceError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Response(format!("HTTP {}: {}", status, text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Http(e.to_string()))?;
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ServiceError::Serialization(e.to_string()))?;

        parsed
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| ServiceError::Response("missing choices".to_string()))
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

//! HTTP client for the LLM completion API

use super::{Completion, DocumentSource, GenerateRequest, LlmClient};
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client for the messages-style completion API.
///
/// An empty API key switches the client to deterministic mock responses so
/// the system runs end-to-end in development without credentials.
pub struct HttpLlmClient {
    config: LlmConfig,
    client: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { config, client })
    }

    fn mock_completion(request: &GenerateRequest) -> Completion {
        let question = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("");
        Completion::text_only(format!(
            "Based on the provided documents, here is an analysis of: {}\n\n\
             [Mock response - LLM API key not configured]",
            question
        ))
    }
}

// Wire structures for the messages API.

#[derive(Serialize)]
#[serde(untagged)]
enum ContentBlock {
    Text {
        #[serde(rename = "type")]
        kind: &'static str,
        text: String,
    },
    Document {
        #[serde(rename = "type")]
        kind: &'static str,
        source: SourceBlock,
        title: String,
        citations: CitationsFlag,
    },
}

#[derive(Serialize)]
struct SourceBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: String,
    data: String,
}

#[derive(Serialize)]
struct CitationsFlag {
    enabled: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    temperature: f32,
    system: String,
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    citations: Vec<Value>,
}

impl From<&DocumentSource> for SourceBlock {
    fn from(source: &DocumentSource) -> Self {
        match source {
            DocumentSource::Text { text } => SourceBlock {
                kind: "text",
                media_type: "text/plain".to_string(),
                data: text.clone(),
            },
            DocumentSource::Base64 { media_type, data } => SourceBlock {
                kind: "base64",
                media_type: media_type.clone(),
                data: data.clone(),
            },
        }
    }
}

fn build_wire_messages(request: &GenerateRequest) -> Vec<WireMessage> {
    let mut wire: Vec<WireMessage> = request
        .messages
        .iter()
        .map(|m| WireMessage {
            role: m.role.clone(),
            content: vec![ContentBlock::Text {
                kind: "text",
                text: m.content.clone(),
            }],
        })
        .collect();

    // Documents ride along on the last user message.
    if !request.documents.is_empty() {
        if let Some(last_user) = wire.iter_mut().rev().find(|m| m.role == "user") {
            for doc in &request.documents {
                last_user.content.push(ContentBlock::Document {
                    kind: "document",
                    source: SourceBlock::from(&doc.source),
                    title: doc.title.clone(),
                    citations: CitationsFlag {
                        enabled: doc.citations_enabled,
                    },
                });
            }
        }
    }

    wire
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, request: GenerateRequest) -> Result<Completion> {
        if self.config.api_key.is_empty() {
            return Ok(Self::mock_completion(&request));
        }

        let body = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system_prompt.clone(),
            messages: build_wire_messages(&request),
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::CollaboratorTimeout {
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::CollaboratorAuth {
                message: format!("completion API returned {}", status),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Collaborator {
                message: format!("completion API error {}: {}", status, body),
            });
        }

        let parsed: MessagesResponse =
            response
                .json()
                .await
                .map_err(|e| AppError::CollaboratorMalformed {
                    message: format!("failed to parse completion response: {}", e),
                })?;

        let mut text = String::new();
        let mut raw_citations = Vec::new();
        for block in parsed.content {
            if block.kind == "text" {
                text.push_str(&block.text);
                raw_citations.extend(block.citations);
            }
        }

        if text.is_empty() {
            return Err(AppError::CollaboratorMalformed {
                message: "completion response contained no text blocks".to_string(),
            });
        }

        Ok(Completion {
            text,
            raw_citations,
        })
    }
}

//! Chat completion clients used to write answers from retrieved context.


use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::config::{GenerationConfig, Provider};
use crate::http;
use crate::{DocQueryError, Result};

const OPERATION: &str = "chat completion";

/// Produces text for a system instruction and a user message
pub trait Generator: Send + Sync {
    fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String>;
}

/// Generation client for OpenAI-compatible and Ollama chat endpoints
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    endpoint: Url,
    provider: Provider,
    model: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpGenerator {
    /// Build a client, reading the API key from the configured variable
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Self::with_api_key(config, config.api_key())
    }

    #[inline]
    pub fn with_api_key(config: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DocQueryError::Config(e.to_string()))?;
        let endpoint = config
            .endpoint()
            .map_err(|e| DocQueryError::Config(e.to_string()))?;

        if api_key.is_none() && config.provider == Provider::OpenAi {
            return Err(DocQueryError::Config(format!(
                "No API key found in ${}",
                config.api_key_env
            )));
        }

        Ok(Self {
            endpoint,
            provider: config.provider,
            model: config.model.clone(),
            api_key,
            agent: http::build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = http::build_agent(timeout);
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_body(
        &self,
        system_instruction: &str,
        user_message: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> serde_json::Result<String> {
        let messages = [
            Message {
                role: "system",
                content: system_instruction,
            },
            Message {
                role: "user",
                content: user_message,
            },
        ];

        match self.provider {
            Provider::OpenAi => serde_json::to_string(&OpenAiChatRequest {
                model: &self.model,
                messages,
                max_tokens: max_output_tokens,
                temperature,
            }),
            Provider::Ollama => serde_json::to_string(&OllamaChatRequest {
                model: &self.model,
                messages,
                stream: false,
                options: OllamaOptions {
                    temperature,
                    num_predict: max_output_tokens,
                },
            }),
        }
    }

    fn parse_response(&self, response_text: &str) -> Result<String> {
        let malformed = |e: serde_json::Error| {
            DocQueryError::GenerationFailure(format!("Failed to parse chat response: {e}"))
        };

        let message = match self.provider {
            Provider::OpenAi => {
                let response: OpenAiChatResponse =
                    serde_json::from_str(response_text).map_err(malformed)?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .map(|choice| choice.message)
                    .ok_or_else(|| {
                        DocQueryError::GenerationFailure(
                            "Chat response contained no choices".to_string(),
                        )
                    })?
            }
            Provider::Ollama => {
                let response: OllamaChatResponse =
                    serde_json::from_str(response_text).map_err(malformed)?;
                response.message
            }
        };

        message.content.ok_or_else(|| {
            DocQueryError::GenerationFailure("Chat response message has no content".to_string())
        })
    }
}

impl Generator for HttpGenerator {
    #[inline]
    fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let body = self
            .request_body(system_instruction, user_message, max_output_tokens, temperature)
            .map_err(|e| {
                DocQueryError::GenerationFailure(format!("Failed to serialize request: {e}"))
            })?;

        debug!(
            "Requesting completion from {} (max {} tokens, temperature {})",
            self.model, max_output_tokens, temperature
        );

        let response_text =
            http::post_json(&self.agent, &self.endpoint, self.api_key.as_deref(), &body)
                .map_err(|e| e.into_pipeline_error(OPERATION, DocQueryError::GenerationFailure))?;

        self.parse_response(&response_text)
    }
}

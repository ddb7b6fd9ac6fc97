
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use super::{Embedder, check_shape};
use crate::config::{EmbeddingConfig, Provider};
use crate::http;
use crate::{DocQueryError, Result};

const OPERATION: &str = "embedding request";

/// Embedding client for OpenAI-compatible and Ollama endpoints
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    endpoint: Url,
    provider: Provider,
    model: String,
    dimension: usize,
    batch_size: usize,
    api_key: Option<String>,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    /// Build a client, reading the API key from the configured variable
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Self::with_api_key(config, config.api_key())
    }

    #[inline]
    pub fn with_api_key(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
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
            dimension: config.dimension as usize,
            batch_size: config.batch_size as usize,
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

    /// Embed one request-sized batch
    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            DocQueryError::EmbeddingFailure(format!("Failed to serialize request: {e}"))
        })?;

        let response_text = http::post_json(
            &self.agent,
            &self.endpoint,
            self.api_key.as_deref(),
            &request_json,
        )
        .map_err(|e| e.into_pipeline_error(OPERATION, DocQueryError::EmbeddingFailure))?;

        let vectors = self.parse_response(&response_text)?;
        check_shape(&vectors, texts.len(), self.dimension)?;
        Ok(vectors)
    }

    fn parse_response(&self, response_text: &str) -> Result<Vec<Vec<f32>>> {
        let malformed = |e: serde_json::Error| {
            DocQueryError::EmbeddingFailure(format!("Failed to parse embedding response: {e}"))
        };

        match self.provider {
            Provider::OpenAi => {
                let mut response: OpenAiEmbedResponse =
                    serde_json::from_str(response_text).map_err(malformed)?;
                // Items carry their input position; do not trust array order
                response.data.sort_by_key(|item| item.index);
                if response
                    .data
                    .iter()
                    .enumerate()
                    .any(|(position, item)| item.index != position)
                {
                    return Err(DocQueryError::EmbeddingFailure(
                        "Embedding response indices are not contiguous".to_string(),
                    ));
                }
                Ok(response.data.into_iter().map(|item| item.embedding).collect())
            }
            Provider::Ollama => {
                let response: OllamaEmbedResponse =
                    serde_json::from_str(response_text).map_err(malformed)?;
                Ok(response.embeddings)
            }
        }
    }
}

impl Embedder for HttpEmbedder {
    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed `texts`, splitting into requests of at most `batch_size` inputs
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Embedding {} texts with {} ({} per request)",
            texts.len(),
            self.model,
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_single_batch(batch)?);
        }

        info!(
            "Generated {} embeddings of dimension {}",
            vectors.len(),
            self.dimension
        );
        Ok(vectors)
    }
}

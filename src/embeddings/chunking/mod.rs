
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::{DocQueryError, Result};

/// A contiguous token window of one document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Decoded text of the token window
    pub text: String,
    /// Name of the uploaded file the chunk came from
    pub source_filename: String,
    /// Position of this chunk within its file, starting at 0
    pub chunk_index: usize,
    /// First token of the window (inclusive)
    pub start_token: usize,
    /// End of the window (exclusive)
    pub end_token: usize,
}

impl Chunk {
    #[inline]
    pub fn token_count(&self) -> usize {
        self.end_token - self.start_token
    }
}

/// Configuration for token-window chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in tokens
    pub max_chunk_size: usize,
    /// Tokens shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl ChunkingConfig {
    /// Distance between the starts of consecutive windows
    #[inline]
    pub fn stride(&self) -> usize {
        self.max_chunk_size - self.chunk_overlap
    }

    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(DocQueryError::Config(
                "max_chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.chunk_overlap >= self.max_chunk_size {
            return Err(DocQueryError::Config(format!(
                "chunk_overlap ({}) must be smaller than max_chunk_size ({})",
                self.chunk_overlap, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Converts text to and from a token stream
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn decode(&self, tokens: &[u32]) -> String;
}

/// The `cl100k_base` BPE shared by the OpenAI embedding and chat models
pub struct Cl100kTokenizer {
    bpe: CoreBPE,
}

impl Cl100kTokenizer {
    #[inline]
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| DocQueryError::Config(format!("Failed to load tokenizer: {e}")))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for Cl100kTokenizer {
    #[inline]
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text)
    }

    #[inline]
    fn decode(&self, tokens: &[u32]) -> String {
        // A window edge can split a multi-byte character across tokens; the
        // partial bytes become U+FFFD so the text still spans every token
        let bytes: Vec<u8> = self
            .bpe
            ._decode_native_and_split(tokens.to_vec())
            .flatten()
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Splits extracted document text into overlapping token windows
pub struct Segmenter {
    tokenizer: Arc<dyn Tokenizer>,
    config: ChunkingConfig,
}

impl Segmenter {
    /// Create a segmenter using the `cl100k_base` tokenizer
    #[inline]
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Self::with_tokenizer(Arc::new(Cl100kTokenizer::new()?), config)
    }

    #[inline]
    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>, config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { tokenizer, config })
    }

    /// Slide a `max_chunk_size` window over the token stream of `text`.
    ///
    /// Consecutive windows share exactly `chunk_overlap` tokens and together
    /// cover every token. Only the last window may be shorter than
    /// `max_chunk_size`. Empty text yields no chunks.
    #[inline]
    pub fn segment(&self, text: &str, filename: &str) -> Vec<Chunk> {
        let tokens = self.tokenizer.encode(text);
        if tokens.is_empty() {
            debug!("{} produced no tokens", filename);
            return Vec::new();
        }

        let size = self.config.max_chunk_size;
        let stride = self.config.stride();
        let mut chunks = Vec::with_capacity(tokens.len().div_ceil(stride));
        let mut start = 0;

        loop {
            let end = (start + size).min(tokens.len());
            chunks.push(Chunk {
                text: self.tokenizer.decode(&tokens[start..end]),
                source_filename: filename.to_string(),
                chunk_index: chunks.len(),
                start_token: start,
                end_token: end,
            });

            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        debug!(
            "Segmented {} ({} tokens) into {} chunks",
            filename,
            tokens.len(),
            chunks.len()
        );

        chunks
    }
}

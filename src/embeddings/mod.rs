// Embeddings module
// Token-window chunking and the HTTP embedding client

pub mod chunking;
pub mod client;

pub use chunking::{Chunk, ChunkingConfig, Cl100kTokenizer, Segmenter, Tokenizer};
pub use client::HttpEmbedder;

use crate::{DocQueryError, Result};

/// Turns texts into fixed-dimension vectors.
///
/// Implementations must return exactly one vector per input, in input order.
pub trait Embedder: Send + Sync {
    /// Dimensionality of every vector this embedder produces
    fn dimension(&self) -> usize;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text
    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()])?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(DocQueryError::EmbeddingFailure(
                "expected exactly one vector for a single query".to_string(),
            )),
        }
    }
}

/// Check that `vectors` is a `expected_rows x dimension` matrix
#[inline]
pub fn check_shape(vectors: &[Vec<f32>], expected_rows: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected_rows {
        return Err(DocQueryError::EmbeddingFailure(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected_rows,
            vectors.len()
        )));
    }

    if let Some((row, vector)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != dimension)
    {
        return Err(DocQueryError::EmbeddingFailure(format!(
            "Vector {} has {} dimensions, expected {}",
            row,
            vector.len(),
            dimension
        )));
    }

    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(DocQueryError::EmbeddingFailure(
            "Embedding contains non-finite values".to_string(),
        ));
    }

    Ok(())
}

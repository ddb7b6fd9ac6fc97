//! Exact nearest-neighbour search over the corpus embeddings.


use tracing::debug;

use crate::{DocQueryError, Result};

/// Brute-force index ranking rows by squared Euclidean distance.
///
/// Vectors are stored row-major in one contiguous buffer, so row `i` of the
/// index is the embedding of chunk `i` in the corpus it was built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

/// Nearest rows for one query, ordered nearest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub distances: Vec<f32>,
    pub row_ids: Vec<usize>,
}

impl SearchResult {
    #[inline]
    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}

impl FlatL2Index {
    /// Build an index from an `N x D` matrix.
    ///
    /// All rows must share one non-zero dimensionality. An empty matrix gives
    /// an empty index that refuses to search.
    #[inline]
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::default());
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(DocQueryError::EmbeddingFailure(
                "Cannot index zero-dimensional vectors".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(DocQueryError::EmbeddingFailure(format!(
                    "Row {} has {} dimensions, expected {}",
                    row,
                    vector.len(),
                    dimension
                )));
            }
            data.extend_from_slice(vector);
        }

        debug!("Built index of {} vectors ({}d)", vectors.len(), dimension);
        Ok(Self { dimension, data })
    }

    /// Number of indexed vectors
    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Find the `k` rows closest to `query`.
    ///
    /// `k` is capped at the number of indexed rows. Ties keep row order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<SearchResult> {
        if self.is_empty() {
            return Err(DocQueryError::IndexNotReady);
        }
        if query.len() != self.dimension {
            return Err(DocQueryError::EmbeddingFailure(format!(
                "Query has {} dimensions, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .enumerate()
            .collect();
        // NaN distances of either sign rank after every real distance
        scored.sort_by(|a, b| {
            a.1.is_nan()
                .cmp(&b.1.is_nan())
                .then_with(|| a.1.total_cmp(&b.1))
        });
        scored.truncate(k.min(scored.len()));

        let (row_ids, distances) = scored.into_iter().unzip();
        Ok(SearchResult { distances, row_ids })
    }
}

#[inline]
fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

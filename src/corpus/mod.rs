//! Process-wide corpus state: chunk text, chunk metadata and the vector index
//! published together as one immutable snapshot.


use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use tracing::{error, info};

use crate::embeddings::Chunk;
use crate::index::FlatL2Index;
use crate::{DocQueryError, Result};

/// One ingestion's chunks and the index built over their embeddings.
///
/// Row `i` of the index always belongs to `chunks[i]`.
#[derive(Debug, Clone)]
pub struct CorpusSnapshot {
    chunks: Vec<Chunk>,
    index: FlatL2Index,
}

impl CorpusSnapshot {
    #[inline]
    pub fn new(chunks: Vec<Chunk>, index: FlatL2Index) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(DocQueryError::IngestionFailure(format!(
                "Index has {} rows but corpus has {} chunks",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self { chunks, index })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn index(&self) -> &FlatL2Index {
        &self.index
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Distinct source filenames, sorted
    #[inline]
    pub fn filenames(&self) -> Vec<&str> {
        self.chunks
            .iter()
            .map(|c| c.source_filename.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Fetch the chunk behind an index row
    #[inline]
    pub fn get(&self, row_id: usize) -> Result<&Chunk> {
        self.chunks.get(row_id).ok_or_else(|| {
            error!(
                "Row {} requested from a corpus of {} chunks",
                row_id,
                self.chunks.len()
            );
            DocQueryError::OutOfRange {
                row_id,
                len: self.chunks.len(),
            }
        })
    }
}

/// Holder of the current snapshot.
///
/// `replace` publishes a fully built snapshot by swapping a pointer; readers
/// take one `Arc` at the start of an operation and never see a mix of
/// generations.
#[derive(Debug, Default)]
pub struct CorpusStore {
    current: RwLock<Option<Arc<CorpusSnapshot>>>,
}

impl CorpusStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `snapshot`, discarding the previous one
    #[inline]
    pub fn replace(&self, snapshot: CorpusSnapshot) {
        let snapshot = Arc::new(snapshot);
        info!("Publishing corpus of {} chunks", snapshot.len());

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(snapshot);
    }

    /// The current snapshot, if any ingestion has succeeded
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<CorpusSnapshot>> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.as_ref().map(Arc::clone)
    }

    /// Whether a non-empty corpus is available for queries
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some_and(|s| !s.is_empty())
    }

    /// Fetch a chunk from the current snapshot
    #[inline]
    pub fn get(&self, row_id: usize) -> Result<Chunk> {
        let snapshot = self.snapshot().ok_or(DocQueryError::NoDocumentsIndexed)?;
        snapshot.get(row_id).cloned()
    }
}

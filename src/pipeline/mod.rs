// Pipeline module
// Ingestion of uploaded documents and retrieval-augmented answering

pub mod prompt;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{CorpusSnapshot, CorpusStore};
use crate::embeddings::{Chunk, Embedder, HttpEmbedder, Segmenter, check_shape};
use crate::extract::{DocumentKind, FileExtractor, TextExtractor};
use crate::generation::{Generator, HttpGenerator};
use crate::index::FlatL2Index;
use crate::{DocQueryError, Result};

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    #[inline]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub num_chunks: usize,
    /// Uploaded files, including skipped ones
    pub num_files: usize,
    /// Files that were unsupported or yielded no text
    pub skipped_files: Vec<String>,
}

/// Citation for one chunk used as context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub filename: String,
    pub chunk_index: usize,
}

impl Source {
    fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            filename: chunk.source_filename.clone(),
            chunk_index: chunk.chunk_index,
        }
    }
}

impl fmt::Display for Source {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File: {}, Chunk: {}", self.filename, self.chunk_index)
    }
}

/// A generated answer and the chunks it was grounded on, nearest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Source>,
}

/// Answer payload for transports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub num_sources: usize,
}

impl From<Answer> for QueryResponse {
    #[inline]
    fn from(answer: Answer) -> Self {
        let sources: Vec<String> = answer.sources.iter().map(ToString::to_string).collect();
        Self {
            answer: answer.text,
            num_sources: sources.len(),
            sources,
        }
    }
}

/// Retrieval breadth and generation limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerSettings {
    pub top_k: usize,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for AnswerSettings {
    #[inline]
    fn default() -> Self {
        Self {
            top_k: 3,
            max_output_tokens: 500,
            temperature: 0.1,
        }
    }
}

impl From<&Config> for AnswerSettings {
    #[inline]
    fn from(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            max_output_tokens: config.generation.max_output_tokens,
            temperature: config.generation.temperature,
        }
    }
}

/// Ingests document batches and answers questions over the latest one.
///
/// Ingestions are serialised; queries run concurrently and each reads a
/// single corpus snapshot from start to finish.
pub struct RagPipeline {
    segmenter: Segmenter,
    extractor: Arc<dyn TextExtractor>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: AnswerSettings,
    store: CorpusStore,
    ingest_lock: Mutex<()>,
}

impl RagPipeline {
    #[inline]
    pub fn new(
        segmenter: Segmenter,
        extractor: Arc<dyn TextExtractor>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: AnswerSettings,
    ) -> Self {
        Self {
            segmenter,
            extractor,
            embedder,
            generator,
            settings,
            store: CorpusStore::new(),
            ingest_lock: Mutex::new(()),
        }
    }

    /// Wire up the HTTP services and tokenizer described by `config`
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| DocQueryError::Config(e.to_string()))?;

        let segmenter = Segmenter::new(config.chunking.clone())?;
        let embedder = HttpEmbedder::new(&config.embedding)?;
        let generator = HttpGenerator::new(&config.generation)?;

        Ok(Self::new(
            segmenter,
            Arc::new(FileExtractor),
            Arc::new(embedder),
            Arc::new(generator),
            AnswerSettings::from(config),
        ))
    }

    #[inline]
    pub fn settings(&self) -> AnswerSettings {
        self.settings
    }

    #[inline]
    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    /// Whether a corpus is available for queries
    #[inline]
    pub fn health(&self) -> bool {
        self.store.is_ready()
    }

    /// Replace the corpus with the contents of `uploads`.
    ///
    /// The new corpus is published only if every step succeeds; on any error
    /// the previous corpus stays in place.
    #[inline]
    pub fn ingest(&self, uploads: &[Upload]) -> Result<IngestReport> {
        let _writer = self.ingest_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if uploads.is_empty() {
            return Err(DocQueryError::InvalidInput("No files provided".to_string()));
        }

        let classified: Vec<(&Upload, Option<DocumentKind>)> = uploads
            .iter()
            .map(|upload| (upload, DocumentKind::from_filename(&upload.filename)))
            .collect();
        if classified.iter().all(|(_, kind)| kind.is_none()) {
            return Err(DocQueryError::InvalidInput(
                "No supported documents provided (expected .pdf, .txt or .md)".to_string(),
            ));
        }

        info!("Ingesting {} files", uploads.len());

        let mut chunks = Vec::new();
        let mut skipped_files = Vec::new();

        for (upload, kind) in classified {
            let Some(kind) = kind else {
                warn!("Skipping unsupported file {}", upload.filename);
                skipped_files.push(upload.filename.clone());
                continue;
            };

            let text = self.extractor.extract(kind, &upload.bytes);
            let file_chunks = self.segmenter.segment(&text, &upload.filename);
            if file_chunks.is_empty() {
                let miss = DocQueryError::ExtractionEmpty {
                    filename: upload.filename.clone(),
                };
                warn!("{}; skipping", miss);
                skipped_files.push(upload.filename.clone());
                continue;
            }

            debug!(
                "{} ({}) produced {} chunks",
                upload.filename,
                kind,
                file_chunks.len()
            );
            chunks.extend(file_chunks);
        }

        if chunks.is_empty() {
            return Err(DocQueryError::IngestionFailure(
                "No text could be extracted from the uploaded files".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;
        check_shape(&vectors, texts.len(), self.embedder.dimension())?;

        let index = FlatL2Index::build(&vectors)?;
        let snapshot = CorpusSnapshot::new(chunks, index)?;
        let num_chunks = snapshot.len();
        self.store.replace(snapshot);

        info!(
            "Indexed {} chunks from {} files ({} skipped)",
            num_chunks,
            uploads.len(),
            skipped_files.len()
        );

        Ok(IngestReport {
            num_chunks,
            num_files: uploads.len(),
            skipped_files,
        })
    }

    /// Answer `question` from the current corpus
    #[inline]
    pub fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(DocQueryError::InvalidInput("No question provided".to_string()));
        }

        let snapshot = self
            .store
            .snapshot()
            .filter(|s| !s.is_empty())
            .ok_or(DocQueryError::NoDocumentsIndexed)?;

        let query_vector = self.embedder.embed_one(question)?;
        let hits = snapshot.index().search(&query_vector, self.settings.top_k)?;
        debug!(
            "Retrieved rows {:?} at distances {:?}",
            hits.row_ids, hits.distances
        );

        let mut context_chunks = Vec::with_capacity(hits.len());
        let mut sources = Vec::with_capacity(hits.len());
        for &row_id in &hits.row_ids {
            let chunk = snapshot.get(row_id)?;
            context_chunks.push(chunk.text.as_str());
            sources.push(Source::from_chunk(chunk));
        }

        let context = prompt::build_context(context_chunks);
        let user_message = prompt::build_user_message(&context, question);

        let completion = self.generator.complete(
            prompt::SYSTEM_INSTRUCTION,
            &user_message,
            self.settings.max_output_tokens,
            self.settings.temperature,
        )?;

        info!("Answered question using {} sources", sources.len());

        Ok(Answer {
            text: completion.trim().to_string(),
            sources,
        })
    }

    /// Answer `question` and format citations for transports
    #[inline]
    pub fn query(&self, question: &str) -> Result<QueryResponse> {
        self.answer(question).map(QueryResponse::from)
    }
}

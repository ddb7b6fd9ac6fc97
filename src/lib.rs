use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocQueryError>;

#[derive(Error, Debug)]
pub enum DocQueryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No text could be extracted from {filename}")]
    ExtractionEmpty { filename: String },

    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),

    #[error("Embedding error: {0}")]
    EmbeddingFailure(String),

    #[error("Vector index has not been built")]
    IndexNotReady,

    #[error("No documents have been indexed yet")]
    NoDocumentsIndexed,

    #[error("Row {row_id} is out of range for a corpus of {len} chunks")]
    OutOfRange { row_id: usize, len: usize },

    #[error("Generation error: {0}")]
    GenerationFailure(String),

    #[error("Timed out waiting for {operation}")]
    UpstreamTimeout { operation: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Stable, transport-facing classification of a [`DocQueryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    ExtractionEmpty,
    IngestionFailure,
    EmbeddingFailure,
    IndexNotReady,
    NoDocumentsIndexed,
    OutOfRange,
    GenerationFailure,
    UpstreamTimeout,
    Config,
    Internal,
}

impl ErrorKind {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::ExtractionEmpty => "extraction_empty",
            Self::IngestionFailure => "ingestion_failure",
            Self::EmbeddingFailure => "embedding_failure",
            Self::IndexNotReady => "index_not_ready",
            Self::NoDocumentsIndexed => "no_documents_indexed",
            Self::OutOfRange => "out_of_range",
            Self::GenerationFailure => "generation_failure",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DocQueryError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::ExtractionEmpty { .. } => ErrorKind::ExtractionEmpty,
            Self::IngestionFailure(_) => ErrorKind::IngestionFailure,
            Self::EmbeddingFailure(_) => ErrorKind::EmbeddingFailure,
            Self::IndexNotReady => ErrorKind::IndexNotReady,
            Self::NoDocumentsIndexed => ErrorKind::NoDocumentsIndexed,
            Self::OutOfRange { .. } => ErrorKind::OutOfRange,
            Self::GenerationFailure(_) => ErrorKind::GenerationFailure,
            Self::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }
}

pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod extract;
pub mod generation;
pub mod http;
pub mod index;
pub mod pipeline;

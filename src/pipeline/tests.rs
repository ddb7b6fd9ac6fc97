use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::*;
use crate::embeddings::ChunkingConfig;

const KEYWORDS: [&str; 3] = ["cat", "dog", "fish"];

/// Scores each text by keyword occurrences so retrieval is predictable
#[derive(Default)]
struct KeywordEmbedder {
    calls: AtomicUsize,
    fail: AtomicBool,
    wrong_dimension: AtomicBool,
}

impl KeywordEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect()
    }
}

impl Embedder for KeywordEmbedder {
    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DocQueryError::EmbeddingFailure("service down".to_string()));
        }
        if self.wrong_dimension.load(Ordering::SeqCst) {
            return Ok(texts.iter().map(|_| vec![0.0]).collect());
        }
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Completion {
    system: String,
    user: String,
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<Completion>>,
    fail: AtomicBool,
}

impl RecordingGenerator {
    fn last(&self) -> Completion {
        self.calls
            .lock()
            .expect("lock")
            .last()
            .cloned()
            .expect("generator was called")
    }

    fn count(&self) -> usize {
        self.calls.lock().expect("lock").len()
    }
}

impl Generator for RecordingGenerator {
    fn complete(
        &self,
        system_instruction: &str,
        user_message: &str,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        self.calls.lock().expect("lock").push(Completion {
            system: system_instruction.to_string(),
            user: user_message.to_string(),
            max_output_tokens,
            temperature,
        });
        if self.fail.load(Ordering::SeqCst) {
            return Err(DocQueryError::GenerationFailure("model unavailable".to_string()));
        }
        Ok("  The answer.\n".to_string())
    }
}

struct Harness {
    pipeline: RagPipeline,
    embedder: Arc<KeywordEmbedder>,
    generator: Arc<RecordingGenerator>,
}

fn harness_with(chunking: ChunkingConfig, settings: AnswerSettings) -> Harness {
    let embedder = Arc::new(KeywordEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let pipeline = RagPipeline::new(
        Segmenter::new(chunking).expect("tokenizer loads"),
        Arc::new(FileExtractor),
        Arc::clone(&embedder) as Arc<dyn Embedder>,
        Arc::clone(&generator) as Arc<dyn Generator>,
        settings,
    );
    Harness {
        pipeline,
        embedder,
        generator,
    }
}

fn harness() -> Harness {
    harness_with(ChunkingConfig::default(), AnswerSettings::default())
}

fn pets() -> Vec<Upload> {
    vec![
        Upload::new("cats.txt", "A cat sleeps most of the day."),
        Upload::new("dogs.txt", "A dog needs a daily walk."),
        Upload::new("fish.md", "Fish live in water."),
    ]
}

#[test]
fn ingest_reports_counts() {
    let h = harness();
    let report = h.pipeline.ingest(&pets()).expect("ingests");

    assert_eq!(
        report,
        IngestReport {
            num_chunks: 3,
            num_files: 3,
            skipped_files: Vec::new(),
        }
    );
    assert!(h.pipeline.health());
    // One batched call for the whole corpus
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn answer_is_grounded_on_nearest_chunks() {
    let h = harness_with(
        ChunkingConfig::default(),
        AnswerSettings {
            top_k: 2,
            ..AnswerSettings::default()
        },
    );
    h.pipeline.ingest(&pets()).expect("ingests");

    let answer = h
        .pipeline
        .answer("  Does a cat like a dog? Cat people say no.  ")
        .expect("answers");

    assert_eq!(answer.text, "The answer.");
    assert_eq!(
        answer.sources,
        vec![
            Source {
                filename: "cats.txt".to_string(),
                chunk_index: 0,
            },
            Source {
                filename: "dogs.txt".to_string(),
                chunk_index: 0,
            },
        ]
    );

    let call = h.generator.last();
    assert_eq!(call.system, prompt::SYSTEM_INSTRUCTION);
    assert_eq!(
        call.user,
        "Context:\nA cat sleeps most of the day.\n\nA dog needs a daily walk.\n\n\
         Question: Does a cat like a dog? Cat people say no.\n\nAnswer:"
    );
    assert_eq!(call.max_output_tokens, 500);
    assert!((call.temperature - 0.1).abs() < f32::EPSILON);
}

#[test]
fn query_formats_sources() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("ingests");

    let response = h.pipeline.query("fish?").expect("answers");
    assert_eq!(response.answer, "The answer.");
    assert_eq!(response.num_sources, 3);
    assert_eq!(response.sources[0], "File: fish.md, Chunk: 0");
}

#[test]
fn top_k_is_capped_by_corpus_size() {
    let h = harness();
    h.pipeline
        .ingest(&[Upload::new("only.txt", "Just one cat here.")])
        .expect("ingests");

    let answer = h.pipeline.answer("cat?").expect("answers");
    assert_eq!(answer.sources.len(), 1);
}

#[test]
fn query_before_ingest_fails() {
    let h = harness();
    assert!(!h.pipeline.health());
    assert!(matches!(
        h.pipeline.answer("anything?"),
        Err(DocQueryError::NoDocumentsIndexed)
    ));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.generator.count(), 0);
}

#[test]
fn blank_question_is_invalid() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("ingests");

    for question in ["", "   ", "\n\t"] {
        let error = h.pipeline.answer(question).expect_err("rejected");
        assert_eq!(error.kind(), crate::ErrorKind::InvalidInput);
    }
    assert_eq!(h.generator.count(), 0);
}

#[test]
fn reingest_replaces_corpus() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("first ingest");
    h.pipeline
        .ingest(&[Upload::new("new.txt", "A goldfish and a cat.")])
        .expect("second ingest");

    let answer = h.pipeline.answer("cat").expect("answers");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].filename, "new.txt");
}

#[test]
fn failed_embedding_keeps_previous_corpus() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("first ingest");

    h.embedder.fail.store(true, Ordering::SeqCst);
    let error = h
        .pipeline
        .ingest(&[Upload::new("new.txt", "Replacement text.")])
        .expect_err("embedding fails");
    assert!(matches!(error, DocQueryError::EmbeddingFailure(_)));

    h.embedder.fail.store(false, Ordering::SeqCst);
    let snapshot = h.pipeline.store().snapshot().expect("old corpus kept");
    assert_eq!(snapshot.filenames(), vec!["cats.txt", "dogs.txt", "fish.md"]);
}

#[test]
fn misshapen_embeddings_abort_ingestion() {
    let h = harness();
    h.embedder.wrong_dimension.store(true, Ordering::SeqCst);

    let error = h.pipeline.ingest(&pets()).expect_err("shape check fails");
    assert!(matches!(error, DocQueryError::EmbeddingFailure(_)));
    assert!(!h.pipeline.health());
}

#[test]
fn query_embedding_failure_propagates() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("ingests");
    h.embedder.fail.store(true, Ordering::SeqCst);

    assert!(matches!(
        h.pipeline.answer("cat?"),
        Err(DocQueryError::EmbeddingFailure(_))
    ));
    assert_eq!(h.generator.count(), 0);
}

#[test]
fn generation_failure_propagates() {
    let h = harness();
    h.pipeline.ingest(&pets()).expect("ingests");
    h.generator.fail.store(true, Ordering::SeqCst);

    assert!(matches!(
        h.pipeline.answer("cat?"),
        Err(DocQueryError::GenerationFailure(_))
    ));
    // Exactly one attempt
    assert_eq!(h.generator.count(), 1);
}

#[test]
fn no_files_is_invalid_input() {
    let h = harness();
    assert!(matches!(
        h.pipeline.ingest(&[]),
        Err(DocQueryError::InvalidInput(_))
    ));
}

#[test]
fn only_unsupported_files_is_invalid_input() {
    let h = harness();
    let result = h.pipeline.ingest(&[
        Upload::new("photo.png", vec![0x89, b'P', b'N', b'G']),
        Upload::new("sheet.xlsx", "cells"),
    ]);
    assert!(matches!(result, Err(DocQueryError::InvalidInput(_))));
}

#[test]
fn nothing_extracted_is_ingestion_failure() {
    let h = harness();
    let result = h.pipeline.ingest(&[
        Upload::new("blank.txt", "   \n"),
        Upload::new("broken.pdf", "not really a pdf"),
    ]);
    assert!(matches!(result, Err(DocQueryError::IngestionFailure(_))));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn misses_are_skipped_not_fatal() {
    let h = harness();
    let report = h
        .pipeline
        .ingest(&[
            Upload::new("blank.txt", ""),
            Upload::new("cats.TXT", "A cat."),
            Upload::new("photo.png", "binary"),
        ])
        .expect("ingests the readable file");

    assert_eq!(report.num_chunks, 1);
    assert_eq!(report.num_files, 3);
    assert_eq!(report.skipped_files, vec!["blank.txt", "photo.png"]);
}

#[test]
fn long_documents_keep_chunks_aligned_with_rows() {
    let h = harness_with(
        ChunkingConfig {
            max_chunk_size: 16,
            chunk_overlap: 4,
        },
        AnswerSettings::default(),
    );
    let long_text = "The dog ran. ".repeat(40);
    let report = h
        .pipeline
        .ingest(&[
            Upload::new("long.txt", long_text),
            Upload::new("short.txt", "A cat."),
        ])
        .expect("ingests");

    let snapshot = h.pipeline.store().snapshot().expect("published");
    assert!(report.num_chunks > 2);
    assert_eq!(snapshot.len(), report.num_chunks);
    assert_eq!(snapshot.index().len(), report.num_chunks);

    let long_indices: Vec<usize> = snapshot
        .chunks()
        .iter()
        .filter(|c| c.source_filename == "long.txt")
        .map(|c| c.chunk_index)
        .collect();
    assert_eq!(long_indices, (0..long_indices.len()).collect::<Vec<_>>());

    let answer = h.pipeline.answer("cat").expect("answers");
    assert_eq!(answer.sources[0].filename, "short.txt");
}

#[test]
fn settings_follow_config() {
    let mut config = Config::default();
    config.retrieval.top_k = 7;
    config.generation.max_output_tokens = 128;
    config.generation.temperature = 0.0;

    let settings = AnswerSettings::from(&config);
    assert_eq!(settings.top_k, 7);
    assert_eq!(settings.max_output_tokens, 128);
    assert!(settings.temperature.abs() < f32::EPSILON);
    assert_eq!(AnswerSettings::default(), AnswerSettings::from(&Config::default()));
}

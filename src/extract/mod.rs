//! Best-effort text extraction from uploaded documents.
//!
//! Extraction never fails: anything that cannot be read yields empty text,
//! which the pipeline reports as a per-file miss.


use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

/// Upload formats the pipeline knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Classify an upload by its file extension, ignoring case
    #[inline]
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::PlainText),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "text",
        }
    }
}

impl fmt::Display for DocumentKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns raw upload bytes into plain text
pub trait TextExtractor: Send + Sync {
    /// Return the document text, or an empty string if none can be read
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> String;
}

/// Extracts PDFs with `pdf-extract` and decodes text files as UTF-8
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    #[inline]
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> String {
        match kind {
            DocumentKind::Pdf => extract_pdf(bytes),
            DocumentKind::PlainText => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> String {
    // The PDF parser panics on some malformed inputs
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match outcome {
        Ok(Ok(pages)) => {
            debug!("Extracted {} pages from PDF", pages.len());
            join_pages(&pages)
        }
        Ok(Err(e)) => {
            warn!("Failed to extract PDF text: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("PDF parser panicked; treating document as empty");
            String::new()
        }
    }
}

/// Prefix each page with a `[Page N]` marker, counting from 1.
///
/// A document whose pages are all blank yields empty text rather than bare
/// markers.
fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    if pages.iter().all(|page| page.as_ref().trim().is_empty()) {
        return String::new();
    }

    pages
        .iter()
        .enumerate()
        .fold(String::new(), |mut text, (index, page)| {
            text.push_str("\n[Page ");
            text.push_str(&(index + 1).to_string());
            text.push_str("]\n");
            text.push_str(page.as_ref());
            text
        })
}

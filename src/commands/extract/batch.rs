use std::path::Path;

use chrono::Utc;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::DocumentError;
use crate::model::{
    Document, DocumentEntry, ExtractionLogEntry, ExtractionMethod, FailedDocument, RunSummary,
};

use super::corpus::{build_document_corpus, remove_document_corpus, write_document_corpus};
use super::loader::DocumentLoader;

/// Result of one document in a batch, paired with the log entry recording it.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub entry: DocumentEntry,
    pub log_entry: ExtractionLogEntry,
    pub result: Result<Document, DocumentError>,
}

impl DocumentOutcome {
    pub fn fell_back(&self) -> bool {
        self.result.is_ok() && self.log_entry.fell_back
    }
}

/// Extracts every entry on the current rayon pool. Output order matches input
/// order; a failing document never affects its neighbours.
pub fn run_batch(
    loader: &DocumentLoader,
    source_dir: &Path,
    corpus_dir: &Path,
    entries: &[DocumentEntry],
) -> Vec<DocumentOutcome> {
    entries
        .par_iter()
        .map(|entry| process_document(loader, source_dir, corpus_dir, entry))
        .collect()
}

pub(super) fn process_document(
    loader: &DocumentLoader,
    source_dir: &Path,
    corpus_dir: &Path,
    entry: &DocumentEntry,
) -> DocumentOutcome {
    let pdf_path = source_dir.join(&entry.path);
    debug!(document_id = %entry.document_id, path = %pdf_path.display(), "extracting document");

    let loaded = match loader.load(&entry.document_id, &pdf_path) {
        Ok(loaded) => loaded,
        Err(failure) => {
            return failed_outcome(corpus_dir, entry, None, false, Vec::new(), failure.into());
        }
    };

    let method = loaded.method;
    let fell_back = loaded.fell_back;
    let notes = loaded.notes.clone();

    let corpus = match build_document_corpus(entry, loaded, Utc::now()) {
        Ok(corpus) => corpus,
        Err(error) => {
            return failed_outcome(corpus_dir, entry, Some(method), fell_back, notes, error.into());
        }
    };

    if let Err(error) = write_document_corpus(corpus_dir, &corpus) {
        let error = DocumentError::Persist {
            document_id: entry.document_id.clone(),
            reason: format!("{error:#}"),
        };
        return failed_outcome(corpus_dir, entry, Some(method), fell_back, notes, error);
    }

    let document = corpus.document;
    DocumentOutcome {
        entry: entry.clone(),
        log_entry: ExtractionLogEntry {
            document_id: entry.document_id.clone(),
            source_file: entry.path.clone(),
            sha256: entry.sha256.clone(),
            method: Some(document.extraction_method),
            success: true,
            page_count: document.page_count,
            degenerate_page_count: document.degenerate_page_count,
            fell_back,
            reason: None,
            notes,
            timestamp: document.extracted_at,
        },
        result: Ok(document),
    }
}

/// A failed document must not keep text from an earlier successful run in the
/// corpus, or the tag stage would still see it.
fn failed_outcome(
    corpus_dir: &Path,
    entry: &DocumentEntry,
    method: Option<ExtractionMethod>,
    fell_back: bool,
    mut notes: Vec<String>,
    error: DocumentError,
) -> DocumentOutcome {
    match remove_document_corpus(corpus_dir, &entry.document_id) {
        Ok(true) => notes.push("removed corpus artifacts from an earlier extraction".to_string()),
        Ok(false) => {}
        Err(remove_error) => {
            let detail = format!("{remove_error:#}");
            warn!(
                document_id = %entry.document_id,
                error = %detail,
                "stale corpus artifacts could not be removed"
            );
            notes.push(format!("stale corpus artifacts not removed: {detail}"));
        }
    }

    warn!(
        document_id = %entry.document_id,
        kind = error.kind(),
        error = %error,
        "document failed"
    );

    DocumentOutcome {
        entry: entry.clone(),
        log_entry: ExtractionLogEntry {
            document_id: entry.document_id.clone(),
            source_file: entry.path.clone(),
            sha256: entry.sha256.clone(),
            method,
            success: false,
            page_count: 0,
            degenerate_page_count: 0,
            fell_back,
            reason: Some(error.to_string()),
            notes,
            timestamp: Utc::now(),
        },
        result: Err(error),
    }
}

/// `succeeded`, `fell_back` and `failed` partition `attempted`.
pub fn summarize(
    outcomes: &[DocumentOutcome],
    documents_in_inventory: usize,
    skipped_completed: usize,
) -> (RunSummary, Vec<FailedDocument>) {
    let mut summary = RunSummary {
        documents_in_inventory,
        attempted: outcomes.len(),
        skipped_completed,
        ..RunSummary::default()
    };
    let mut failures = Vec::new();

    for outcome in outcomes {
        match &outcome.result {
            Ok(_) if outcome.fell_back() => summary.fell_back += 1,
            Ok(_) => summary.succeeded += 1,
            Err(error) => {
                summary.failed += 1;
                failures.push(FailedDocument {
                    document_id: outcome.entry.document_id.clone(),
                    source_file: outcome.entry.path.clone(),
                    kind: error.kind().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    (summary, failures)
}

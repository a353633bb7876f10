use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use chrono::Utc;

use super::backend::{parse_pdfinfo_pages, split_form_feed_pages};
use super::corpus::{corpus_paths, write_document_corpus};
use super::loader::is_degenerate_page;
use super::run::{partition_pending, render_extract_command};
use super::*;
use crate::cli::ExtractArgs;
use crate::error::{CorpusIntegrityError, DocumentError};
use crate::model::{
    Document, DocumentEntry, DocumentType, ExtractionLogEntry, ExtractionMethod, Page,
};

const USABLE: &str = "We will reduce absolute scope 1 and 2 emissions by 30% by 2030.";

/// Serves canned pages per file name; a missing name is an extraction error.
struct CannedBackend {
    method: ExtractionMethod,
    outputs: HashMap<String, Vec<String>>,
}

impl CannedBackend {
    fn new(method: ExtractionMethod, outputs: &[(&str, &[&str])]) -> Self {
        Self {
            method,
            outputs: outputs
                .iter()
                .map(|(name, pages)| {
                    (
                        name.to_string(),
                        pages.iter().map(|page| page.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }
}

impl PageBackend for CannedBackend {
    fn method(&self) -> ExtractionMethod {
        self.method
    }

    fn name(&self) -> &str {
        match self.method {
            ExtractionMethod::Primary => "canned-primary",
            ExtractionMethod::Fallback => "canned-fallback",
        }
    }

    fn extract_pages(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<String>> {
        let name = pdf_path
            .file_name()
            .and_then(|value| value.to_str())
            .unwrap_or_default();
        let mut pages = self
            .outputs
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("cannot read {name}"))?;
        if let Some(max_pages) = max_pages {
            pages.truncate(max_pages);
        }
        Ok(pages)
    }
}

fn loader(primary: &[(&str, &[&str])], fallback: &[(&str, &[&str])]) -> DocumentLoader {
    DocumentLoader::new(
        Box::new(CannedBackend::new(ExtractionMethod::Primary, primary)),
        Box::new(CannedBackend::new(ExtractionMethod::Fallback, fallback)),
        LoaderSettings::default(),
    )
}

fn entry(document_id: &str, file: &str) -> DocumentEntry {
    DocumentEntry {
        document_id: document_id.to_string(),
        path: format!("2022/{file}"),
        year: 2022,
        document_type: DocumentType::SustainabilityReport,
        sha256: format!("sha-{document_id}"),
    }
}

fn page(page_number: u32, raw_text: &str) -> Page {
    Page {
        page_number,
        raw_text: raw_text.to_string(),
    }
}

fn sample_corpus(pages: Vec<Page>) -> DocumentCorpus {
    DocumentCorpus {
        document: Document {
            document_id: "2022_gcs".to_string(),
            source_file: "2022/gcs.pdf".to_string(),
            sha256: "sha".to_string(),
            year: 2022,
            document_type: DocumentType::SustainabilityReport,
            page_count: pages.len(),
            extraction_method: ExtractionMethod::Primary,
            extracted_at: Utc::now(),
            degenerate_page_count: 0,
        },
        pages,
    }
}

#[test]
fn loader_keeps_usable_primary_output() {
    let loader = loader(&[("a.pdf", &[USABLE, USABLE])], &[]);

    let loaded = loader.load("a", Path::new("a.pdf")).expect("primary output");

    assert_eq!(loaded.method, ExtractionMethod::Primary);
    assert!(!loaded.fell_back);
    assert_eq!(loaded.pages.len(), 2);
    assert_eq!(loaded.pages[1].page_number, 2);
    assert_eq!(loaded.degenerate_page_count, 0);
}

#[test]
fn loader_falls_back_when_most_pages_are_degenerate() {
    let loader = loader(
        &[("a.pdf", &["", "   ", USABLE])],
        &[("a.pdf", &[USABLE, USABLE, USABLE])],
    );

    let loaded = loader.load("a", Path::new("a.pdf")).expect("fallback output");

    assert_eq!(loaded.method, ExtractionMethod::Fallback);
    assert!(loaded.fell_back);
    assert_eq!(loaded.pages.len(), 3);
    assert!(loaded.notes[0].contains("degenerate"));
}

#[test]
fn loader_falls_back_when_primary_errors() {
    let loader = loader(&[], &[("a.pdf", &[USABLE])]);

    let loaded = loader.load("a", Path::new("a.pdf")).expect("fallback output");

    assert_eq!(loaded.method, ExtractionMethod::Fallback);
    assert!(loaded.fell_back);
    assert!(loaded.notes[0].contains("canned-primary failed"));
}

#[test]
fn loader_reports_failure_when_both_strategies_fail() {
    let loader = loader(&[], &[]);

    let failure = loader
        .load("a", Path::new("a.pdf"))
        .expect_err("no strategy can read the file");

    assert_eq!(failure.document_id, "a");
    assert!(failure.reason.contains("canned-primary"));
    assert!(failure.reason.contains("canned-fallback"));
}

#[test]
fn loader_keeps_degenerate_primary_when_fallback_errors() {
    let loader = loader(&[("a.pdf", &["", "x"])], &[]);

    let loaded = loader.load("a", Path::new("a.pdf")).expect("primary kept");

    assert_eq!(loaded.method, ExtractionMethod::Primary);
    assert!(!loaded.fell_back);
    assert_eq!(loaded.degenerate_page_count, 2);
    assert!(loaded.notes.iter().any(|note| note.contains("kept degenerate")));
}

#[test]
fn loader_treats_empty_documents_as_degenerate() {
    let loader = loader(&[("a.pdf", &[])], &[("a.pdf", &[USABLE])]);

    let loaded = loader.load("a", Path::new("a.pdf")).expect("fallback output");

    assert!(loaded.fell_back);
    assert_eq!(loaded.pages.len(), 1);
}

#[test]
fn degenerate_page_detects_sparse_and_garbled_text() {
    assert!(is_degenerate_page("Page 4", 40));
    assert!(!is_degenerate_page(USABLE, 40));

    let garbled = "\u{FFFD}".repeat(30) + "readable text here";
    assert!(is_degenerate_page(&garbled, 10));
}

#[test]
fn batch_isolates_a_failing_document() {
    let corpus_dir = tempfile::tempdir().expect("tempdir");
    let loader = loader(
        &[("one.pdf", &[USABLE, USABLE]), ("three.pdf", &["", ""])],
        &[("three.pdf", &[USABLE, USABLE])],
    );
    let entries = vec![
        entry("2022_one", "one.pdf"),
        entry("2022_two", "two.pdf"),
        entry("2022_three", "three.pdf"),
    ];

    let outcomes = run_batch(&loader, Path::new("/reports"), corpus_dir.path(), &entries);

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].result.is_ok());
    assert!(matches!(
        outcomes[1].result,
        Err(DocumentError::Extraction(_))
    ));
    assert!(outcomes[2].result.is_ok());
    assert!(outcomes[2].fell_back());

    assert!(!outcomes[1].log_entry.success);
    assert!(outcomes[1].log_entry.reason.is_some());
    assert_eq!(outcomes[2].log_entry.method, Some(ExtractionMethod::Fallback));

    let (summary, failures) = summarize(&outcomes, 3, 0);
    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.fell_back, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].document_id, "2022_two");
    assert_eq!(failures[0].kind, "extraction_failure");

    assert_eq!(
        list_corpus_documents(corpus_dir.path()).expect("list corpus"),
        vec!["2022_one".to_string(), "2022_three".to_string()]
    );
    let three = load_corpus_document(corpus_dir.path(), "2022_three").expect("load three");
    assert_eq!(three.document.extraction_method, ExtractionMethod::Fallback);
    assert_eq!(three.document.citation(2), "GCS_2022:2");
}

#[test]
fn failed_reextraction_removes_earlier_corpus_artifacts() {
    let corpus_dir = tempfile::tempdir().expect("tempdir");
    let entries = vec![entry("2022_two", "two.pdf")];

    let readable = loader(&[("two.pdf", &[USABLE, USABLE])], &[]);
    let first = run_batch(&readable, Path::new("/reports"), corpus_dir.path(), &entries);
    assert!(first[0].result.is_ok());
    assert_eq!(
        list_corpus_documents(corpus_dir.path()).expect("list corpus"),
        vec!["2022_two".to_string()]
    );

    let unreadable = loader(&[], &[]);
    let second = run_batch(&unreadable, Path::new("/reports"), corpus_dir.path(), &entries);
    assert!(second[0].result.is_err());
    assert!(
        second[0]
            .log_entry
            .notes
            .iter()
            .any(|note| note.contains("removed corpus artifacts"))
    );

    assert!(
        list_corpus_documents(corpus_dir.path())
            .expect("list corpus")
            .is_empty()
    );
    let paths = corpus_paths(corpus_dir.path(), "2022_two");
    assert!(!paths.pages_path.exists());
    assert!(!paths.metadata_path.exists());
}

#[test]
fn validate_page_numbers_rejects_duplicates_and_gaps() {
    let duplicate = validate_page_numbers("doc", &[page(1, "a"), page(1, "b")]);
    assert_eq!(
        duplicate,
        Err(CorpusIntegrityError::DuplicatePage {
            document_id: "doc".to_string(),
            page_number: 1,
        })
    );

    let gap = validate_page_numbers("doc", &[page(1, "a"), page(3, "b")]);
    assert_eq!(
        gap,
        Err(CorpusIntegrityError::NonContiguous {
            document_id: "doc".to_string(),
            expected: 2,
            found: 3,
        })
    );

    assert!(validate_page_numbers("doc", &[page(1, ""), page(2, "")]).is_ok());
}

#[test]
fn page_tagged_text_preserves_blank_pages_and_marker_lookalikes() {
    let pages = vec![
        page(1, "Introduction\nOur goals"),
        page(2, ""),
        page(3, "[page 9]\n\\[page 2]\ntrailing\n"),
    ];

    let rendered = render_page_tagged_text(&pages);
    assert!(rendered.contains("\\[page 9]"));

    let parsed = parse_page_tagged_text("doc", &rendered).expect("parse");
    assert_eq!(parsed, pages);
}

#[test]
fn page_tagged_text_keeps_carriage_returns() {
    let pages = vec![
        page(1, "Scope 1\r\nScope 2\r\n"),
        page(2, "\r"),
        page(3, "last line\r"),
    ];

    let rendered = render_page_tagged_text(&pages);
    let parsed = parse_page_tagged_text("doc", &rendered).expect("parse");

    assert_eq!(parsed, pages);
}

#[test]
fn page_tagged_text_rejects_text_before_first_marker() {
    let error = parse_page_tagged_text("doc", "stray\n[page 1]\ntext").expect_err("stray text");
    assert_eq!(
        error,
        CorpusIntegrityError::TextOutsidePage {
            document_id: "doc".to_string(),
        }
    );

    let error = parse_page_tagged_text("doc", "[page 1]\na\n[page 3]\nb").expect_err("gap");
    assert!(matches!(error, CorpusIntegrityError::NonContiguous { .. }));
}

#[test]
fn load_corpus_document_checks_declared_page_count() {
    let corpus_dir = tempfile::tempdir().expect("tempdir");
    let mut corpus = sample_corpus(vec![page(1, "alpha"), page(2, "beta")]);
    write_document_corpus(corpus_dir.path(), &corpus).expect("write corpus");

    let loaded = load_corpus_document(corpus_dir.path(), "2022_gcs").expect("load");
    assert_eq!(loaded, corpus);

    corpus.document.page_count = 3;
    write_document_corpus(corpus_dir.path(), &corpus).expect("rewrite corpus");
    let error = load_corpus_document(corpus_dir.path(), "2022_gcs").expect_err("mismatch");
    assert_eq!(
        error.downcast_ref::<CorpusIntegrityError>(),
        Some(&CorpusIntegrityError::PageCountMismatch {
            document_id: "2022_gcs".to_string(),
            declared: 3,
            actual: 2,
        })
    );
}

#[test]
fn split_form_feed_pages_keeps_blank_pages() {
    assert_eq!(
        split_form_feed_pages("first\u{000C}\u{000C}third\u{000C}"),
        vec!["first".to_string(), String::new(), "third".to_string()]
    );
    assert_eq!(split_form_feed_pages("only"), vec!["only".to_string()]);
}

#[test]
fn parse_pdfinfo_pages_reads_page_count() {
    let raw = "Title:          Report\nPages:          212\nEncrypted:      no\n";
    assert_eq!(parse_pdfinfo_pages(raw), Some(212));
    assert_eq!(parse_pdfinfo_pages("Title: x\n"), None);
}

fn log_entry(document_id: &str, sha256: &str, success: bool) -> ExtractionLogEntry {
    ExtractionLogEntry {
        document_id: document_id.to_string(),
        source_file: format!("2022/{document_id}.pdf"),
        sha256: sha256.to_string(),
        method: success.then_some(ExtractionMethod::Primary),
        success,
        page_count: if success { 4 } else { 0 },
        degenerate_page_count: 0,
        fell_back: false,
        reason: (!success).then(|| "unreadable".to_string()),
        notes: Vec::new(),
        timestamp: Utc::now(),
    }
}

#[test]
fn extraction_log_survives_reopen_and_tracks_latest_attempt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("manifests").join(EXTRACTION_LOG_NAME);

    let mut log = ExtractionLog::open(&path).expect("open new log");
    log.append(log_entry("a", "sha-a", true));
    log.append(log_entry("b", "sha-b", true));
    log.append(log_entry("b", "sha-b", false));
    log.flush().expect("flush");

    let mut reopened = ExtractionLog::open(&path).expect("reopen");
    assert_eq!(reopened.entries().len(), 3);
    assert!(reopened.appended().is_empty());
    assert!(reopened.is_completed("a", "sha-a"));
    assert!(!reopened.is_completed("a", "sha-changed"));
    assert!(!reopened.is_completed("b", "sha-b"));
    assert!(!reopened.latest_by_document()["b"].success);

    reopened.append(log_entry("c", "sha-c", true));
    assert_eq!(reopened.appended().len(), 1);
}

#[test]
fn partition_pending_requires_log_entry_and_corpus_artifacts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let corpus_dir = dir.path().join(CORPUS_DIR_NAME);
    let mut log = ExtractionLog::open(&dir.path().join(EXTRACTION_LOG_NAME)).expect("open log");

    let done = entry("2022_done", "done.pdf");
    let missing_artifacts = entry("2022_missing", "missing.pdf");
    let fresh = entry("2022_fresh", "fresh.pdf");
    log.append(log_entry("2022_done", &done.sha256, true));
    log.append(log_entry("2022_missing", &missing_artifacts.sha256, true));

    let metadata_path = corpus_paths(&corpus_dir, "2022_done").metadata_path;
    fs::create_dir_all(&corpus_dir).expect("mkdir");
    fs::write(&metadata_path, b"{}").expect("write metadata");

    let documents = vec![done, missing_artifacts, fresh];
    let (pending, skipped) = partition_pending(&documents, &log, &corpus_dir, false);
    assert_eq!(skipped, 1);
    assert_eq!(
        pending
            .iter()
            .map(|document| document.document_id.as_str())
            .collect::<Vec<_>>(),
        vec!["2022_missing", "2022_fresh"]
    );

    let (pending, skipped) = partition_pending(&documents, &log, &corpus_dir, true);
    assert_eq!(skipped, 0);
    assert_eq!(pending.len(), 3);
}

#[test]
fn render_extract_command_includes_loader_settings() {
    let args = ExtractArgs {
        work_root: PathBuf::from(".cache/esgscan"),
        input_dir: PathBuf::from("extracted_reports"),
        inventory_manifest_path: None,
        extract_manifest_path: None,
        refresh_inventory: true,
        force: false,
        max_pages_per_doc: Some(5),
        min_page_chars: 40,
        max_degenerate_fraction: 0.5,
        ocr_lang: "eng".to_string(),
        jobs: Some(4),
    };

    let command = render_extract_command(&args);
    assert!(command.starts_with("esgscan extract --work-root .cache/esgscan"));
    assert!(command.contains("--refresh-inventory"));
    assert!(!command.contains("--force"));
    assert!(command.contains("--max-pages-per-doc 5"));
    assert!(command.contains("--max-degenerate-fraction 0.5"));
    assert!(command.contains("--jobs 4"));
}

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::CorpusIntegrityError;
use crate::model::{Document, DocumentEntry, Page};
use crate::util::{ensure_directory, read_json, write_atomic, write_json_pretty};

use super::loader::LoadedPages;

pub const CORPUS_DIR_NAME: &str = "corpus";
const PAGES_SUFFIX: &str = ".pages.txt";
const METADATA_SUFFIX: &str = ".metadata.json";

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[page (\d+)\]$").expect("page marker regex is valid"));
static ESCAPED_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\+\[page \d+\]$").expect("escaped marker regex is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCorpus {
    pub document: Document,
    pub pages: Vec<Page>,
}

/// Pairs loader output with the inventory entry. Pages are never renumbered.
pub fn build_document_corpus(
    entry: &DocumentEntry,
    loaded: LoadedPages,
    extracted_at: DateTime<Utc>,
) -> Result<DocumentCorpus, CorpusIntegrityError> {
    validate_page_numbers(&entry.document_id, &loaded.pages)?;

    Ok(DocumentCorpus {
        document: Document {
            document_id: entry.document_id.clone(),
            source_file: entry.path.clone(),
            sha256: entry.sha256.clone(),
            year: entry.year,
            document_type: entry.document_type,
            page_count: loaded.pages.len(),
            extraction_method: loaded.method,
            extracted_at,
            degenerate_page_count: loaded.degenerate_page_count,
        },
        pages: loaded.pages,
    })
}

/// Page numbers must be exactly `1..=pages.len()`, in order.
pub fn validate_page_numbers(document_id: &str, pages: &[Page]) -> Result<(), CorpusIntegrityError> {
    let mut seen = HashSet::with_capacity(pages.len());
    for page in pages {
        if !seen.insert(page.page_number) {
            return Err(CorpusIntegrityError::DuplicatePage {
                document_id: document_id.to_string(),
                page_number: page.page_number,
            });
        }
    }

    for (index, page) in pages.iter().enumerate() {
        let expected = (index + 1) as u32;
        if page.page_number != expected {
            return Err(CorpusIntegrityError::NonContiguous {
                document_id: document_id.to_string(),
                expected,
                found: page.page_number,
            });
        }
    }

    Ok(())
}

/// `[page N]` marker line followed by the page text; an empty page is a bare
/// marker. Lines split on `\n` only, so `\r` survives the round trip. Text
/// lines that look like a marker are escaped with a leading backslash.
pub fn render_page_tagged_text(pages: &[Page]) -> String {
    let mut out = String::new();
    for page in pages {
        out.push_str(&format!("[page {}]\n", page.page_number));
        if page.raw_text.is_empty() {
            continue;
        }
        for line in page.raw_text.split('\n') {
            if PAGE_MARKER.is_match(line) || ESCAPED_MARKER.is_match(line) {
                out.push('\\');
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub fn parse_page_tagged_text(
    document_id: &str,
    raw: &str,
) -> Result<Vec<Page>, CorpusIntegrityError> {
    let mut pages = Vec::<Page>::new();
    let mut current: Option<(u32, Vec<&str>)> = None;

    let body = raw.strip_suffix('\n').unwrap_or(raw);
    for line in body.split('\n') {
        if let Some(captures) = PAGE_MARKER.captures(line) {
            if let Some((page_number, lines)) = current.take() {
                pages.push(Page {
                    page_number,
                    raw_text: lines.join("\n"),
                });
            }
            let page_number = captures
                .get(1)
                .and_then(|value| value.as_str().parse::<u32>().ok())
                .unwrap_or(0);
            current = Some((page_number, Vec::new()));
            continue;
        }

        let line = if ESCAPED_MARKER.is_match(line) {
            &line[1..]
        } else {
            line
        };

        match current.as_mut() {
            Some((_, lines)) => lines.push(line),
            None if line.trim().is_empty() => {}
            None => {
                return Err(CorpusIntegrityError::TextOutsidePage {
                    document_id: document_id.to_string(),
                });
            }
        }
    }

    if let Some((page_number, lines)) = current.take() {
        pages.push(Page {
            page_number,
            raw_text: lines.join("\n"),
        });
    }

    validate_page_numbers(document_id, &pages)?;
    Ok(pages)
}

#[derive(Debug, Clone)]
pub struct CorpusPaths {
    pub pages_path: PathBuf,
    pub metadata_path: PathBuf,
}

pub fn corpus_paths(corpus_dir: &Path, document_id: &str) -> CorpusPaths {
    CorpusPaths {
        pages_path: corpus_dir.join(format!("{document_id}{PAGES_SUFFIX}")),
        metadata_path: corpus_dir.join(format!("{document_id}{METADATA_SUFFIX}")),
    }
}

/// Text first, metadata last: a metadata file implies complete page text.
pub fn write_document_corpus(corpus_dir: &Path, corpus: &DocumentCorpus) -> Result<CorpusPaths> {
    ensure_directory(corpus_dir)?;
    let paths = corpus_paths(corpus_dir, &corpus.document.document_id);

    write_atomic(
        &paths.pages_path,
        render_page_tagged_text(&corpus.pages).as_bytes(),
    )?;
    write_json_pretty(&paths.metadata_path, &corpus.document)?;

    Ok(paths)
}

/// Deletes both artifacts of a document, metadata first so a partial removal
/// never leaves it listed. Returns whether anything was removed.
pub fn remove_document_corpus(corpus_dir: &Path, document_id: &str) -> Result<bool> {
    let paths = corpus_paths(corpus_dir, document_id);
    let mut removed = false;
    for path in [&paths.metadata_path, &paths.pages_path] {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
            removed = true;
        }
    }
    Ok(removed)
}

/// Reads a document back and re-checks page integrity against its metadata.
pub fn load_corpus_document(corpus_dir: &Path, document_id: &str) -> Result<DocumentCorpus> {
    let paths = corpus_paths(corpus_dir, document_id);
    let document: Document = read_json(&paths.metadata_path)?;
    let raw = fs::read_to_string(&paths.pages_path)
        .with_context(|| format!("failed to read {}", paths.pages_path.display()))?;

    let pages = parse_page_tagged_text(&document.document_id, &raw)?;
    if pages.len() != document.page_count {
        return Err(CorpusIntegrityError::PageCountMismatch {
            document_id: document.document_id.clone(),
            declared: document.page_count,
            actual: pages.len(),
        }
        .into());
    }

    Ok(DocumentCorpus { document, pages })
}

/// Document ids with a metadata record, sorted.
pub fn list_corpus_documents(corpus_dir: &Path) -> Result<Vec<String>> {
    if !corpus_dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();
    let entries = fs::read_dir(corpus_dir)
        .with_context(|| format!("failed to read {}", corpus_dir.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", corpus_dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(document_id) = name.strip_suffix(METADATA_SUFFIX) {
            ids.push(document_id.to_string());
        }
    }

    ids.sort();
    Ok(ids)
}

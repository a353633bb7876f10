use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::ExtractionFailure;
use crate::model::{ExtractionMethod, Page};
use crate::util::non_whitespace_char_count;

use super::backend::PageBackend;

/// Above this share of replacement/control characters a page reads as garbled.
const GARBLED_CHAR_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderSettings {
    pub min_page_chars: usize,
    pub max_degenerate_fraction: f64,
    pub max_pages: Option<usize>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            min_page_chars: 40,
            max_degenerate_fraction: 0.5,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPages {
    pub pages: Vec<Page>,
    pub method: ExtractionMethod,
    pub fell_back: bool,
    pub degenerate_page_count: usize,
    pub notes: Vec<String>,
}

/// Primary extraction with a single whole-document fallback attempt.
pub struct DocumentLoader {
    primary: Box<dyn PageBackend>,
    fallback: Box<dyn PageBackend>,
    settings: LoaderSettings,
}

impl DocumentLoader {
    pub fn new(
        primary: Box<dyn PageBackend>,
        fallback: Box<dyn PageBackend>,
        settings: LoaderSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            settings,
        }
    }

    pub fn load(
        &self,
        document_id: &str,
        pdf_path: &Path,
    ) -> Result<LoadedPages, ExtractionFailure> {
        let mut notes = Vec::new();

        let primary = self
            .primary
            .extract_pages(pdf_path, self.settings.max_pages);
        let primary = match primary {
            Ok(pages) => {
                let degenerate = self.degenerate_page_count(&pages);
                if !self.is_degenerate_document(pages.len(), degenerate) {
                    debug!(
                        document_id = %document_id,
                        backend = self.primary.name(),
                        pages = pages.len(),
                        "primary extraction accepted"
                    );
                    return Ok(self.finish(pages, self.primary.method(), false, notes));
                }

                let message = format!(
                    "{} output degenerate: {} of {} pages below {} usable characters",
                    self.primary.name(),
                    degenerate,
                    pages.len(),
                    self.settings.min_page_chars
                );
                info!(document_id = %document_id, detail = %message, "retrying with fallback");
                notes.push(message);
                Ok(pages)
            }
            Err(error) => {
                let message = format!("{} failed: {error:#}", self.primary.name());
                warn!(document_id = %document_id, detail = %message, "primary extraction failed");
                notes.push(message);
                Err(error)
            }
        };

        let fallback = self
            .fallback
            .extract_pages(pdf_path, self.settings.max_pages);

        match (primary, fallback) {
            (Ok(primary_pages), Ok(fallback_pages)) => {
                if usable_chars(&fallback_pages) < usable_chars(&primary_pages) {
                    notes.push(format!(
                        "{} produced less usable text than {}; kept {} output",
                        self.fallback.name(),
                        self.primary.name(),
                        self.primary.name()
                    ));
                    Ok(self.finish(primary_pages, self.primary.method(), false, notes))
                } else {
                    Ok(self.finish(fallback_pages, self.fallback.method(), true, notes))
                }
            }
            (Err(_), Ok(fallback_pages)) => {
                Ok(self.finish(fallback_pages, self.fallback.method(), true, notes))
            }
            (Ok(primary_pages), Err(error)) => {
                let message = format!(
                    "{} failed: {error:#}; kept degenerate {} output",
                    self.fallback.name(),
                    self.primary.name()
                );
                warn!(document_id = %document_id, detail = %message, "fallback extraction failed");
                notes.push(message);
                Ok(self.finish(primary_pages, self.primary.method(), false, notes))
            }
            (Err(primary_error), Err(fallback_error)) => Err(ExtractionFailure {
                document_id: document_id.to_string(),
                reason: format!(
                    "{}: {primary_error:#}; {}: {fallback_error:#}",
                    self.primary.name(),
                    self.fallback.name()
                ),
            }),
        }
    }

    fn finish(
        &self,
        texts: Vec<String>,
        method: ExtractionMethod,
        fell_back: bool,
        notes: Vec<String>,
    ) -> LoadedPages {
        let degenerate_page_count = self.degenerate_page_count(&texts);
        let pages = texts
            .into_iter()
            .enumerate()
            .map(|(index, raw_text)| Page {
                page_number: (index + 1) as u32,
                raw_text,
            })
            .collect();

        LoadedPages {
            pages,
            method,
            fell_back,
            degenerate_page_count,
            notes,
        }
    }

    fn degenerate_page_count(&self, pages: &[String]) -> usize {
        pages
            .iter()
            .filter(|page| is_degenerate_page(page, self.settings.min_page_chars))
            .count()
    }

    fn is_degenerate_document(&self, page_count: usize, degenerate: usize) -> bool {
        if page_count == 0 {
            return true;
        }
        degenerate as f64 / page_count as f64 > self.settings.max_degenerate_fraction
    }
}

/// Too little text, or mostly undecodable glyphs.
pub(super) fn is_degenerate_page(text: &str, min_chars: usize) -> bool {
    let total = non_whitespace_char_count(text);
    if total < min_chars {
        return true;
    }

    let garbled = text
        .chars()
        .filter(|character| *character == '\u{FFFD}' || character.is_control())
        .filter(|character| !character.is_whitespace())
        .count();
    total > 0 && garbled as f64 / total as f64 > GARBLED_CHAR_RATIO
}

fn usable_chars(pages: &[String]) -> usize {
    pages
        .iter()
        .map(|page| {
            page.chars()
                .filter(|character| {
                    !character.is_whitespace()
                        && !character.is_control()
                        && *character != '\u{FFFD}'
                })
                .count()
        })
        .sum()
}

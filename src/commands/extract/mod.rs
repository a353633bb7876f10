//! Extraction stage: Document Loader and Page Corpus Builder.

mod backend;
mod batch;
mod corpus;
mod loader;
mod log;
mod run;
#[cfg(test)]
mod tests;

pub use backend::{OcrBackend, PageBackend, PdftotextBackend, collect_tool_versions};
pub use batch::{DocumentOutcome, run_batch, summarize};
pub use corpus::{
    CORPUS_DIR_NAME, DocumentCorpus, list_corpus_documents, load_corpus_document,
    parse_page_tagged_text, render_page_tagged_text, validate_page_numbers,
};
pub use loader::{DocumentLoader, LoadedPages, LoaderSettings};
pub use log::{EXTRACTION_LOG_NAME, ExtractionLog};
pub use run::run;

use thiserror::Error;

/// A document both extraction strategies failed to read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("extraction failed for {document_id}: {reason}")]
pub struct ExtractionFailure {
    pub document_id: String,
    pub reason: String,
}

/// Page numbering of a document is not exactly `1..=page_count`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorpusIntegrityError {
    #[error("{document_id}: page {page_number} appears more than once")]
    DuplicatePage {
        document_id: String,
        page_number: u32,
    },
    #[error("{document_id}: expected page {expected} but found page {found}")]
    NonContiguous {
        document_id: String,
        expected: u32,
        found: u32,
    },
    #[error("{document_id}: metadata declares {declared} pages but {actual} were found")]
    PageCountMismatch {
        document_id: String,
        declared: usize,
        actual: usize,
    },
    #[error("{document_id}: text before the first page marker")]
    TextOutsidePage { document_id: String },
}

/// A dictionary rule that cannot be used. Raised before any document is read.
#[derive(Debug, Error)]
pub enum PatternConfigError {
    #[error("failed to parse pattern dictionary {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
    #[error("rule '{rule_id}' has an invalid pattern '{pattern}': {source}")]
    InvalidRegex {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule '{rule_id}' has no keywords or regex patterns")]
    EmptyMatcher { rule_id: String },
    #[error("rule '{rule_id}' has an empty keyword")]
    EmptyKeyword { rule_id: String },
    #[error("rule '{rule_id}' in category {category} requires `{field}`")]
    MissingSubcategory {
        rule_id: String,
        category: String,
        field: &'static str,
    },
    #[error("rule '{rule_id}' sets `{field}` which category {category} does not use")]
    UnexpectedSubcategory {
        rule_id: String,
        category: String,
        field: &'static str,
    },
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),
    #[error("rule id must not be empty")]
    EmptyRuleId,
    #[error("context window settings must be positive (window_chars={window_chars}, max_quote_chars={max_quote_chars})")]
    InvalidContext {
        window_chars: usize,
        max_quote_chars: usize,
    },
}

/// Why a single document was dropped from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),
    #[error(transparent)]
    Integrity(#[from] CorpusIntegrityError),
    #[error("failed to write corpus for {document_id}: {reason}")]
    Persist { document_id: String, reason: String },
}

impl DocumentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Extraction(_) => "extraction_failure",
            Self::Integrity(_) => "corpus_integrity",
            Self::Persist { .. } => "persist_failure",
        }
    }
}

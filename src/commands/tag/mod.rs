//! Tagging stage: Categorical Extractor and the Finding store.

mod context;
mod export;
mod extractor;
mod run;
mod store;

pub use context::{ContextWindow, SentenceIndex, currency_amounts, percentages_and_years};
pub use export::{FINDINGS_CSV_HEADER, render_findings_csv, write_findings_csv};
pub use extractor::CategoricalExtractor;
pub use run::run;
pub use store::{
    DB_FILE_NAME, count_rows, default_db_path, ensure_schema, load_findings, metadata_value,
    open_store, replace_findings,
};

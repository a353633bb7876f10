use anyhow::Result;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::extract::{
    CORPUS_DIR_NAME, EXTRACTION_LOG_NAME, ExtractionLog, list_corpus_documents,
};
use crate::commands::inventory::INVENTORY_MANIFEST_NAME;
use crate::commands::tag::{count_rows, default_db_path, metadata_value, open_store};
use crate::model::{DocumentInventoryManifest, ExtractionLogEntry, ExtractionMethod};
use crate::util::read_json;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ExtractionState {
    pub documents: usize,
    pub succeeded: usize,
    pub fell_back: usize,
    pub failed: usize,
}

/// Classifies each document by its most recent extraction attempt.
pub(crate) fn extraction_state<'a>(
    latest: impl IntoIterator<Item = &'a ExtractionLogEntry>,
) -> ExtractionState {
    let mut state = ExtractionState::default();
    for entry in latest {
        state.documents += 1;
        match (entry.success, entry.method) {
            (false, _) => state.failed += 1,
            (true, Some(ExtractionMethod::Fallback)) => state.fell_back += 1,
            (true, _) => state.succeeded += 1,
        }
    }
    state
}

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.work_root.join("manifests");
    let inventory_path = manifest_dir.join(INVENTORY_MANIFEST_NAME);
    let log_path = manifest_dir.join(EXTRACTION_LOG_NAME);
    let corpus_dir = args.work_root.join(CORPUS_DIR_NAME);
    let db_path = default_db_path(&args.work_root);

    info!(work_root = %args.work_root.display(), "status requested");

    if inventory_path.exists() {
        let inventory: DocumentInventoryManifest = read_json(&inventory_path)?;
        info!(
            generated_at = %inventory.generated_at,
            source_directory = %inventory.source_directory,
            documents = inventory.document_count,
            "loaded inventory manifest"
        );
    } else {
        warn!(path = %inventory_path.display(), "inventory manifest missing");
    }

    if log_path.exists() {
        let log = ExtractionLog::open(&log_path)?;
        let state = extraction_state(log.latest_by_document().into_values());
        info!(
            attempts = log.entries().len(),
            documents = state.documents,
            succeeded = state.succeeded,
            fell_back = state.fell_back,
            failed = state.failed,
            "extraction log"
        );
    } else {
        warn!(path = %log_path.display(), "extraction log missing");
    }

    if corpus_dir.exists() {
        let documents = list_corpus_documents(&corpus_dir)?;
        info!(path = %corpus_dir.display(), documents = documents.len(), "page corpus");
    } else {
        warn!(path = %corpus_dir.display(), "page corpus missing");
    }

    if db_path.exists() {
        let connection = open_store(&db_path)?;
        let documents = count_rows(&connection, "SELECT COUNT(*) FROM documents")?;
        let findings = count_rows(&connection, "SELECT COUNT(*) FROM findings")?;
        let dictionary_version = metadata_value(&connection, "dictionary_version")?;
        let tagged_at = metadata_value(&connection, "tagged_at")?;

        info!(
            path = %db_path.display(),
            documents,
            findings,
            dictionary_version = dictionary_version.as_deref().unwrap_or("unknown"),
            tagged_at = tagged_at.as_deref().unwrap_or("never"),
            "findings database"
        );
    } else {
        warn!(path = %db_path.display(), "findings database missing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn entry(
        document_id: &str,
        success: bool,
        method: Option<ExtractionMethod>,
    ) -> ExtractionLogEntry {
        ExtractionLogEntry {
            document_id: document_id.to_string(),
            source_file: format!("2022/{document_id}.pdf"),
            sha256: "sha".to_string(),
            method,
            success,
            page_count: if success { 3 } else { 0 },
            degenerate_page_count: 0,
            fell_back: method == Some(ExtractionMethod::Fallback),
            reason: (!success).then(|| "pdftotext exited with 1".to_string()),
            notes: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn extraction_state_counts_each_outcome_once() {
        let entries = [
            entry("a", true, Some(ExtractionMethod::Primary)),
            entry("b", true, Some(ExtractionMethod::Fallback)),
            entry("c", false, None),
            entry("d", true, Some(ExtractionMethod::Primary)),
        ];

        let state = extraction_state(entries.iter());

        assert_eq!(
            state,
            ExtractionState {
                documents: 4,
                succeeded: 2,
                fell_back: 1,
                failed: 1,
            }
        );
    }
}

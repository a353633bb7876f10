use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::cli::TagArgs;
use crate::commands::extract::{
    CORPUS_DIR_NAME, EXTRACTION_LOG_NAME, ExtractionLog, list_corpus_documents,
    load_corpus_document,
};
use crate::error::CorpusIntegrityError;
use crate::model::{Category, CategoryCount, Document, Finding, TagRunManifest};
use crate::patterns::PatternDictionary;
use crate::util::{build_thread_pool, now_utc_string, utc_compact_string, write_json_pretty};

use super::export::write_findings_csv;
use super::extractor::CategoricalExtractor;
use super::store::{default_db_path, open_store, replace_findings};

pub fn run(args: TagArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("tag-{}", utc_compact_string(started_ts));

    let work_root = args.work_root.clone();
    let manifest_dir = work_root.join("manifests");
    let corpus_dir = work_root.join(CORPUS_DIR_NAME);
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&work_root));
    let export_path = args
        .findings_csv_path
        .clone()
        .unwrap_or_else(|| work_root.join("exports").join("findings.csv"));
    let tag_manifest_path = args.tag_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!("tag_run_{}.json", utc_compact_string(started_ts)))
    });

    // A bad dictionary aborts before any document is read.
    let dictionary = PatternDictionary::load(args.patterns_path.as_deref())?;
    info!(
        run_id = %run_id,
        dictionary = %dictionary.source_name,
        version = %dictionary.version,
        rules = dictionary.rules.len(),
        "starting tagging"
    );

    let document_ids = list_corpus_documents(&corpus_dir)?;
    if document_ids.is_empty() {
        bail!(
            "no extracted documents in {}; run `esgscan extract` first",
            corpus_dir.display()
        );
    }

    let log = ExtractionLog::open(&manifest_dir.join(EXTRACTION_LOG_NAME))?;
    let extractor = CategoricalExtractor::new(&dictionary);
    let pool = build_thread_pool(args.jobs)?;
    let TaggedCorpus {
        documents,
        findings,
        warnings,
    } = pool.install(|| tag_corpus(&corpus_dir, &document_ids, &log, &extractor));
    let rejected = warnings.len();

    let mut connection = open_store(&db_path)?;
    let stored = replace_findings(&mut connection, &documents, &findings, &dictionary.version)?;
    info!(path = %db_path.display(), findings = stored, "replaced finding set");

    write_findings_csv(&export_path, &findings)?;
    info!(path = %export_path.display(), "wrote findings export");

    let findings_by_category = category_counts(&findings);
    let manifest = TagRunManifest {
        manifest_version: 1,
        run_id,
        started_at,
        updated_at: now_utc_string(),
        dictionary_version: dictionary.version.clone(),
        dictionary_source: dictionary.source_name.clone(),
        documents_tagged: documents.len(),
        documents_rejected: rejected,
        findings_total: findings.len(),
        findings_by_category: findings_by_category.clone(),
        db_path: db_path.display().to_string(),
        export_path: export_path.display().to_string(),
        warnings,
    };
    write_json_pretty(&tag_manifest_path, &manifest)?;
    info!(path = %tag_manifest_path.display(), "wrote tag run manifest");

    for count in &findings_by_category {
        info!(category = %count.category, findings = count.count, "category total");
    }
    info!(
        documents = documents.len(),
        rejected,
        findings = findings.len(),
        "tagging completed"
    );

    Ok(())
}

#[derive(Debug, Default)]
pub(super) struct TaggedCorpus {
    pub documents: Vec<Document>,
    pub findings: Vec<Finding>,
    pub warnings: Vec<String>,
}

/// Tags every corpus document whose latest extraction attempt succeeded.
/// Documents the log records as failed or never attempted, and documents that
/// fail to load, are warned about and skipped; the rest of the batch goes on.
pub(super) fn tag_corpus(
    corpus_dir: &Path,
    document_ids: &[String],
    log: &ExtractionLog,
    extractor: &CategoricalExtractor<'_>,
) -> TaggedCorpus {
    let latest = log.latest_by_document();
    let mut tagged = TaggedCorpus::default();

    let mut eligible = Vec::with_capacity(document_ids.len());
    for document_id in document_ids {
        match latest.get(document_id.as_str()) {
            Some(entry) if entry.success => eligible.push(document_id),
            Some(_) => {
                warn!(
                    document_id = %document_id,
                    "latest extraction attempt failed; stale corpus document skipped"
                );
                tagged
                    .warnings
                    .push(format!("{document_id}: latest extraction attempt failed"));
            }
            None => {
                warn!(document_id = %document_id, "no extraction log entry; document skipped");
                tagged
                    .warnings
                    .push(format!("{document_id}: no extraction log entry"));
            }
        }
    }

    let results = eligible
        .par_iter()
        .map(|document_id| {
            load_corpus_document(corpus_dir, document_id).map(|corpus| {
                let findings = extractor.extract_document(&corpus);
                (corpus.document, findings)
            })
        })
        .collect::<Vec<Result<(Document, Vec<Finding>)>>>();

    for (document_id, result) in eligible.into_iter().zip(results) {
        match result {
            Ok((document, document_findings)) => {
                info!(
                    document_id = %document.document_id,
                    document_type = %document.document_type,
                    year = document.year,
                    pages = document.page_count,
                    findings = document_findings.len(),
                    "document tagged"
                );
                tagged.documents.push(document);
                tagged.findings.extend(document_findings);
            }
            Err(error) => {
                if let Some(integrity) = error.downcast_ref::<CorpusIntegrityError>() {
                    warn!(
                        document_id = %document_id,
                        error = %integrity,
                        "corpus integrity violation; document skipped"
                    );
                } else {
                    let detail = format!("{error:#}");
                    warn!(document_id = %document_id, error = %detail, "document skipped");
                }
                tagged.warnings.push(format!("{document_id}: {error:#}"));
            }
        }
    }

    tagged
}

pub(super) fn category_counts(findings: &[Finding]) -> Vec<CategoryCount> {
    Category::ALL
        .into_iter()
        .map(|category| CategoryCount {
            category,
            count: findings
                .iter()
                .filter(|finding| finding.category == category)
                .count(),
        })
        .collect()
}

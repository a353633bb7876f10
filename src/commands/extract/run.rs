use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cli::ExtractArgs;
use crate::commands::inventory::{self, INVENTORY_MANIFEST_NAME};
use crate::model::{DocumentEntry, ExtractPaths, ExtractRunManifest};
use crate::util::{
    build_thread_pool, ensure_directory, now_utc_string, utc_compact_string, write_json_pretty,
};

use super::backend::{OcrBackend, PdftotextBackend, collect_tool_versions};
use super::batch::{run_batch, summarize};
use super::corpus::{CORPUS_DIR_NAME, corpus_paths};
use super::loader::{DocumentLoader, LoaderSettings};
use super::log::{EXTRACTION_LOG_NAME, ExtractionLog};

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("extract-{}", utc_compact_string(started_ts));

    let work_root = args.work_root.clone();
    let manifest_dir = work_root.join("manifests");
    let corpus_dir = work_root.join(CORPUS_DIR_NAME);
    ensure_directory(&manifest_dir)?;
    ensure_directory(&corpus_dir)?;

    let inventory_manifest_path = args
        .inventory_manifest_path
        .clone()
        .unwrap_or_else(|| manifest_dir.join(INVENTORY_MANIFEST_NAME));
    let extract_manifest_path = args.extract_manifest_path.clone().unwrap_or_else(|| {
        manifest_dir.join(format!(
            "extract_run_{}.json",
            utc_compact_string(started_ts)
        ))
    });
    let extraction_log_path = manifest_dir.join(EXTRACTION_LOG_NAME);

    info!(work_root = %work_root.display(), run_id = %run_id, "starting extraction");

    let inventory = inventory::load_or_refresh(
        &args.input_dir,
        &inventory_manifest_path,
        args.refresh_inventory,
    )?;
    let source_dir = PathBuf::from(&inventory.source_directory);

    let mut log = ExtractionLog::open(&extraction_log_path)?;
    let (pending, skipped) = partition_pending(&inventory.documents, &log, &corpus_dir, args.force);
    if skipped > 0 {
        info!(skipped, "skipping documents already extracted");
    }

    let settings = LoaderSettings {
        min_page_chars: args.min_page_chars,
        max_degenerate_fraction: args.max_degenerate_fraction,
        max_pages: args.max_pages_per_doc,
    };
    let loader = DocumentLoader::new(
        Box::new(PdftotextBackend::new()),
        Box::new(OcrBackend::new(args.ocr_lang.clone())),
        settings,
    );

    let pool = build_thread_pool(args.jobs)?;
    let outcomes = pool.install(|| run_batch(&loader, &source_dir, &corpus_dir, &pending));

    for outcome in &outcomes {
        match &outcome.result {
            Ok(document) => info!(
                document_id = %document.document_id,
                pages = document.page_count,
                method = %document.extraction_method,
                degenerate_pages = document.degenerate_page_count,
                "document extracted"
            ),
            Err(error) => debug!(
                document_id = %outcome.entry.document_id,
                kind = error.kind(),
                "document not extracted"
            ),
        }
        log.append(outcome.log_entry.clone());
    }
    log.flush()?;

    let (summary, failures) = summarize(&outcomes, inventory.document_count, skipped);
    let warnings = failures
        .iter()
        .map(|failure| {
            format!(
                "{} ({}) needs manual extraction: {}",
                failure.document_id, failure.source_file, failure.reason
            )
        })
        .collect::<Vec<String>>();

    let manifest = ExtractRunManifest {
        manifest_version: 1,
        run_id,
        status: if failures.is_empty() {
            "completed".to_string()
        } else {
            "completed_with_failures".to_string()
        },
        started_at,
        updated_at: now_utc_string(),
        command: render_extract_command(&args),
        tool_versions: collect_tool_versions(),
        paths: ExtractPaths {
            work_root: work_root.display().to_string(),
            input_dir: source_dir.display().to_string(),
            inventory_manifest_path: inventory_manifest_path.display().to_string(),
            corpus_dir: corpus_dir.display().to_string(),
            extraction_log_path: extraction_log_path.display().to_string(),
        },
        summary: summary.clone(),
        failures,
        warnings,
    };

    write_json_pretty(&extract_manifest_path, &manifest)?;
    info!(path = %extract_manifest_path.display(), "wrote extract run manifest");

    for failure in &manifest.failures {
        warn!(
            document_id = %failure.document_id,
            source_file = %failure.source_file,
            reason = %failure.reason,
            "failed document"
        );
    }
    info!(
        succeeded = summary.succeeded,
        fell_back = summary.fell_back,
        failed = summary.failed,
        skipped = summary.skipped_completed,
        "extraction completed"
    );

    Ok(())
}

/// Splits the inventory into documents to extract and a count of those a
/// previous run already finished on identical source bytes.
pub(super) fn partition_pending(
    documents: &[DocumentEntry],
    log: &ExtractionLog,
    corpus_dir: &Path,
    force: bool,
) -> (Vec<DocumentEntry>, usize) {
    if force {
        return (documents.to_vec(), 0);
    }

    let mut pending = Vec::with_capacity(documents.len());
    let mut skipped = 0;
    for document in documents {
        let artifacts_present = corpus_paths(corpus_dir, &document.document_id)
            .metadata_path
            .exists();
        if artifacts_present && log.is_completed(&document.document_id, &document.sha256) {
            skipped += 1;
        } else {
            pending.push(document.clone());
        }
    }

    (pending, skipped)
}

pub(super) fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "esgscan".to_string(),
        "extract".to_string(),
        "--work-root".to_string(),
        args.work_root.display().to_string(),
        "--input-dir".to_string(),
        args.input_dir.display().to_string(),
    ];

    if let Some(path) = &args.inventory_manifest_path {
        command.push("--inventory-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if let Some(path) = &args.extract_manifest_path {
        command.push("--extract-manifest-path".to_string());
        command.push(path.display().to_string());
    }
    if args.refresh_inventory {
        command.push("--refresh-inventory".to_string());
    }
    if args.force {
        command.push("--force".to_string());
    }
    if let Some(max_pages) = args.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }

    command.push("--min-page-chars".to_string());
    command.push(args.min_page_chars.to_string());
    command.push("--max-degenerate-fraction".to_string());
    command.push(args.max_degenerate_fraction.to_string());
    command.push("--ocr-lang".to_string());
    command.push(args.ocr_lang.clone());

    if let Some(jobs) = args.jobs {
        command.push("--jobs".to_string());
        command.push(jobs.to_string());
    }

    command.join(" ")
}

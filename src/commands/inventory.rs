use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::InventoryArgs;
use crate::model::{
    DocumentEntry, DocumentInventoryManifest, DocumentType, MAX_REPORT_YEAR, MIN_REPORT_YEAR,
};
use crate::util::{now_utc_string, read_json, safe_stem, sha256_file, write_json_pretty};

pub const INVENTORY_MANIFEST_NAME: &str = "document_inventory.json";

pub fn run(args: InventoryArgs) -> Result<()> {
    let (manifest, warnings) = build_manifest(&args.input_dir)?;
    for warning in &warnings {
        warn!(warning = %warning, "inventory warning");
    }
    for document_type in DocumentType::ALL {
        let documents = manifest
            .documents
            .iter()
            .filter(|entry| entry.document_type == document_type)
            .count();
        if documents > 0 {
            info!(document_type = document_type.label(), documents, "classified documents");
        }
    }

    if args.dry_run {
        info!(
            document_count = manifest.document_count,
            skipped = warnings.len(),
            source = %manifest.source_directory,
            "inventory dry-run complete"
        );
        return Ok(());
    }

    let manifest_path = args.manifest_path.unwrap_or_else(|| {
        args.work_root
            .join("manifests")
            .join(INVENTORY_MANIFEST_NAME)
    });

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote inventory manifest");
    info!(document_count = manifest.document_count, "inventory completed");

    Ok(())
}

/// Reads an existing inventory unless a refresh is requested or none exists.
pub fn load_or_refresh(
    input_dir: &Path,
    manifest_path: &Path,
    refresh: bool,
) -> Result<DocumentInventoryManifest> {
    if refresh || !manifest_path.exists() {
        let (manifest, warnings) = build_manifest(input_dir)?;
        for warning in &warnings {
            warn!(warning = %warning, "inventory warning");
        }
        write_json_pretty(manifest_path, &manifest)?;
        info!(
            path = %manifest_path.display(),
            document_count = manifest.document_count,
            "refreshed inventory manifest"
        );
        return Ok(manifest);
    }

    let manifest: DocumentInventoryManifest = read_json(manifest_path)?;
    info!(
        path = %manifest_path.display(),
        document_count = manifest.document_count,
        "loaded existing inventory manifest"
    );

    Ok(manifest)
}

/// Year and type come from the naming convention, never from file content.
pub fn build_manifest(input_dir: &Path) -> Result<(DocumentInventoryManifest, Vec<String>)> {
    let year_pattern =
        Regex::new(r"(?:^|[^0-9])(202[0-5])(?:[^0-9]|$)").context("failed to compile year regex")?;

    let mut pdf_paths = discover_pdfs(input_dir)?;
    pdf_paths.sort();

    if pdf_paths.is_empty() {
        bail!("no PDFs found in {}", input_dir.display());
    }

    let mut warnings = Vec::new();
    let mut documents = Vec::with_capacity(pdf_paths.len());
    let mut assigned_ids = HashSet::<String>::new();

    for path in pdf_paths {
        let relative = path
            .strip_prefix(input_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        let Some(year) = year_from_path(&relative, &year_pattern) else {
            warnings.push(format!(
                "no report year ({MIN_REPORT_YEAR}-{MAX_REPORT_YEAR}) in path: {relative}"
            ));
            continue;
        };
        let Some(document_type) = DocumentType::classify_filename(&filename) else {
            warnings.push(format!("unrecognized document type for: {relative}"));
            continue;
        };

        let base_id = format!("{}_{}", year, safe_stem(&path));
        let document_id = unique_document_id(&base_id, &mut assigned_ids);

        documents.push(DocumentEntry {
            document_id,
            path: relative,
            year,
            document_type,
            sha256: sha256_file(&path)?,
        });
    }

    documents.sort_by(|a, b| {
        a.year
            .cmp(&b.year)
            .then(a.document_type.cmp(&b.document_type))
            .then(a.path.cmp(&b.path))
    });

    Ok((
        DocumentInventoryManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            source_directory: input_dir.display().to_string(),
            document_count: documents.len(),
            documents,
        },
        warnings,
    ))
}

/// `base_id`, or the first `base_id_N` (N >= 2) no other document holds yet.
fn unique_document_id(base_id: &str, assigned: &mut HashSet<String>) -> String {
    if assigned.insert(base_id.to_string()) {
        return base_id.to_string();
    }

    let mut suffix = 2;
    loop {
        let candidate = format!("{base_id}_{suffix}");
        if assigned.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn discover_pdfs(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    for entry in WalkDir::new(input_dir).follow_links(true) {
        let entry =
            entry.with_context(|| format!("failed to walk {}", input_dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf {
            pdfs.push(entry.into_path());
        }
    }

    Ok(pdfs)
}

/// First report year in the path; directory names win over the filename.
fn year_from_path(relative: &str, pattern: &Regex) -> Option<u32> {
    relative
        .split('/')
        .find_map(|component| pattern.captures(component))
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse::<u32>().ok())
        .filter(|year| (MIN_REPORT_YEAR..=MAX_REPORT_YEAR).contains(year))
}

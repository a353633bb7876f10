use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::AnalyzeArgs;
use crate::commands::tag::{count_rows, default_db_path, load_findings, metadata_value, open_store};
use crate::util::write_json_pretty;

use super::aggregate::summarize;
use super::tables::write_tables;

pub const SUMMARY_FILE_NAME: &str = "analysis_summary.json";

pub fn run(args: AnalyzeArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.work_root));
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.work_root.join("tables"));

    if !db_path.exists() {
        bail!(
            "findings database not found at {}; run `esgscan tag` first",
            db_path.display()
        );
    }

    let connection = open_store(&db_path)?;
    let findings = load_findings(&connection)?;
    let documents = count_rows(&connection, "SELECT COUNT(*) FROM documents")?;
    let dictionary_version = metadata_value(&connection, "dictionary_version")?;

    info!(
        path = %db_path.display(),
        documents,
        findings = findings.len(),
        dictionary_version = dictionary_version.as_deref().unwrap_or("unknown"),
        "loaded finding set"
    );
    if findings.is_empty() {
        warn!("finding set is empty; tables will contain headers only");
    }

    for path in write_tables(&output_dir, &findings)? {
        info!(path = %path.display(), "wrote table");
    }

    let summary = summarize(&findings);
    let summary_path = output_dir.join(SUMMARY_FILE_NAME);
    write_json_pretty(&summary_path, &summary)?;
    info!(path = %summary_path.display(), "wrote analysis summary");

    for total in &summary.category_totals {
        info!(category = %total.category, findings = total.count, "category total");
    }
    for strength in &summary.language_strength {
        info!(
            strength = strength.strength.as_str(),
            findings = strength.count,
            pct = format!("{:.1}", strength.pct_of_language_total),
            "language strength"
        );
    }
    info!(findings = summary.findings_total, "analysis completed");

    Ok(())
}

use std::path::Path;

use anyhow::Result;

use crate::model::Finding;
use crate::util::{csv_line, write_atomic};

pub const FINDINGS_CSV_HEADER: [&str; 12] = [
    "year",
    "document_id",
    "document_type",
    "page_number",
    "citation",
    "category",
    "subcategory",
    "matched_text",
    "context_quote",
    "numeric_values",
    "qualifier",
    "rule_id",
];

pub fn render_findings_csv(findings: &[Finding]) -> String {
    let mut out = csv_line(&FINDINGS_CSV_HEADER);
    out.push('\n');

    for finding in findings {
        let row = [
            finding.year.to_string(),
            finding.document_id.clone(),
            finding.document_type.as_str().to_string(),
            finding.page_number.to_string(),
            finding.citation(),
            finding.category.as_str().to_string(),
            finding
                .subcategory
                .map(|value| value.as_str().to_string())
                .unwrap_or_default(),
            finding.matched_text.clone(),
            finding.context_quote.clone(),
            finding.numeric_values.join("; "),
            finding
                .qualifier
                .map(|value| value.as_str().to_string())
                .unwrap_or_default(),
            finding.rule_id.clone(),
        ];
        out.push_str(&csv_line(&row));
        out.push('\n');
    }

    out
}

pub fn write_findings_csv(path: &Path, findings: &[Finding]) -> Result<()> {
    write_atomic(path, render_findings_csv(findings).as_bytes())
}

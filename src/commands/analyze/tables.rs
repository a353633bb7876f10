use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::model::{Category, CommitmentStrength, Finding, ImpactArea};
use crate::util::{csv_line, ensure_directory, write_atomic};

use super::aggregate::{
    GroupKey, aggregate_by_category, group_counts, impact_area_matrix, language_strength_matrix,
    target_disclosure_channel, target_quantification, yearly_trend,
};

fn pct_cell(value: f64) -> String {
    format!("{value:.2}")
}

fn render(header: &[&str], rows: impl IntoIterator<Item = Vec<String>>) -> String {
    let mut out = csv_line(header);
    out.push('\n');
    for row in rows {
        out.push_str(&csv_line(&row));
        out.push('\n');
    }
    out
}

pub fn category_breakdown_csv(findings: &[Finding]) -> String {
    render(
        &[
            "year",
            "category",
            "subcategory",
            "count",
            "pct_of_year_category_total",
        ],
        aggregate_by_category(findings).into_iter().map(|record| {
            vec![
                record.year.to_string(),
                record.category.as_str().to_string(),
                record
                    .subcategory
                    .map(|value| value.as_str().to_string())
                    .unwrap_or_default(),
                record.count.to_string(),
                pct_cell(record.pct_of_year_category_total),
            ]
        }),
    )
}

pub fn language_strength_csv(findings: &[Finding]) -> String {
    render(
        &[
            "year",
            "strong",
            "moderate",
            "weak",
            "total",
            "strong_pct_of_year_language_total",
            "moderate_pct_of_year_language_total",
            "weak_pct_of_year_language_total",
        ],
        language_strength_matrix(findings).into_iter().map(|row| {
            vec![
                row.year.to_string(),
                row.strong.to_string(),
                row.moderate.to_string(),
                row.weak.to_string(),
                row.total().to_string(),
                pct_cell(row.pct(CommitmentStrength::Strong)),
                pct_cell(row.pct(CommitmentStrength::Moderate)),
                pct_cell(row.pct(CommitmentStrength::Weak)),
            ]
        }),
    )
}

pub fn impact_area_csv(findings: &[Finding]) -> String {
    let header = std::iter::once("year")
        .chain(ImpactArea::ALL.iter().map(|area| area.as_str()))
        .collect::<Vec<&str>>();

    render(
        &header,
        impact_area_matrix(findings).into_iter().map(|row| {
            std::iter::once(row.year.to_string())
                .chain(ImpactArea::ALL.iter().map(|area| row.count(*area).to_string()))
                .collect()
        }),
    )
}

pub fn target_trend_csv(findings: &[Finding]) -> String {
    render(
        &["year", "target_count", "yoy_change", "yoy_pct_change"],
        yearly_trend(findings, Category::Target)
            .into_iter()
            .map(|row| {
                vec![
                    row.year.to_string(),
                    row.count.to_string(),
                    row.yoy_change.map(|value| value.to_string()).unwrap_or_default(),
                    row.yoy_pct_change.map(pct_cell).unwrap_or_default(),
                ]
            }),
    )
}

pub fn target_quantification_csv(findings: &[Finding]) -> String {
    render(
        &[
            "year",
            "quantified",
            "qualitative",
            "pct_quantified_of_year_targets",
        ],
        target_quantification(findings).into_iter().map(|row| {
            vec![
                row.year.to_string(),
                row.quantified.to_string(),
                row.qualitative.to_string(),
                pct_cell(row.pct_quantified()),
            ]
        }),
    )
}

pub fn target_disclosure_channel_csv(findings: &[Finding]) -> String {
    render(
        &[
            "channel",
            "document_type",
            "target_count",
            "pct_of_targets_with_known_type",
        ],
        target_disclosure_channel(findings).into_iter().map(|row| {
            vec![
                row.channel.to_string(),
                row.document_type.as_str().to_string(),
                row.target_count.to_string(),
                pct_cell(row.pct_of_targets_with_known_type),
            ]
        }),
    )
}

pub fn group_counts_csv(findings: &[Finding], keys: &[GroupKey]) -> String {
    let header = keys
        .iter()
        .map(|key| key.as_str())
        .chain(std::iter::once("count"))
        .collect::<Vec<&str>>();

    render(
        &header,
        group_counts(findings, keys).into_iter().map(|group| {
            let mut row = group.values;
            row.push(group.count.to_string());
            row
        }),
    )
}

/// Writes every table into `output_dir` and returns the written paths.
pub fn write_tables(output_dir: &Path, findings: &[Finding]) -> Result<Vec<PathBuf>> {
    ensure_directory(output_dir)?;

    let tables = [
        ("category_breakdown.csv", category_breakdown_csv(findings)),
        ("language_strength_matrix.csv", language_strength_csv(findings)),
        ("impact_area_matrix.csv", impact_area_csv(findings)),
        ("target_trend.csv", target_trend_csv(findings)),
        ("target_quantification.csv", target_quantification_csv(findings)),
        (
            "target_disclosure_channel.csv",
            target_disclosure_channel_csv(findings),
        ),
        (
            "document_type_breakdown.csv",
            group_counts_csv(
                findings,
                &[GroupKey::Year, GroupKey::DocumentType, GroupKey::Category],
            ),
        ),
    ];

    let mut written = Vec::with_capacity(tables.len());
    for (name, content) in tables {
        let path = output_dir.join(name);
        write_atomic(&path, content.as_bytes())?;
        written.push(path);
    }
    Ok(written)
}

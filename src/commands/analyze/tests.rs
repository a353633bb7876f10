use super::tables::{
    category_breakdown_csv, impact_area_csv, language_strength_csv, target_disclosure_channel_csv,
    target_trend_csv,
};
use super::*;
use crate::model::{
    Category, CommitmentStrength, DocumentType, Finding, ImpactArea, Qualifier, Subcategory,
};

fn finding(
    year: u32,
    document_type: DocumentType,
    category: Category,
    subcategory: Option<Subcategory>,
) -> Finding {
    Finding {
        document_id: format!("{year}_{}", document_type.as_str()),
        document_type,
        year,
        page_number: 1,
        category,
        subcategory,
        rule_id: format!("{}-rule", category.as_str()),
        matched_text: "match".to_string(),
        ordinal: 1,
        context_quote: "quote".to_string(),
        numeric_values: Vec::new(),
        qualifier: None,
    }
}

fn language(year: u32, strength: CommitmentStrength) -> Finding {
    finding(
        year,
        DocumentType::SustainabilityReport,
        Category::Language,
        Some(Subcategory::Strength(strength)),
    )
}

fn target(year: u32, document_type: DocumentType, numbers: &[&str]) -> Finding {
    let mut finding = finding(year, document_type, Category::Target, None);
    finding.numeric_values = numbers.iter().map(|value| value.to_string()).collect();
    finding.qualifier = Some(if numbers.is_empty() {
        Qualifier::Qualitative
    } else {
        Qualifier::Quantified
    });
    finding
}

fn area(year: u32, area: ImpactArea) -> Finding {
    finding(
        year,
        DocumentType::CdpWater,
        Category::ImpactArea,
        Some(Subcategory::Area(area)),
    )
}

fn sample() -> Vec<Finding> {
    vec![
        language(2021, CommitmentStrength::Strong),
        language(2021, CommitmentStrength::Weak),
        language(2021, CommitmentStrength::Weak),
        language(2022, CommitmentStrength::Moderate),
        language(2022, CommitmentStrength::Strong),
        language(2022, CommitmentStrength::Strong),
        target(2021, DocumentType::SustainabilityReport, &["30%", "2030"]),
        target(2021, DocumentType::AnnualFiling, &[]),
        target(2022, DocumentType::SustainabilityReport, &["50%"]),
        target(2022, DocumentType::CdpClimate, &["2025"]),
        target(2022, DocumentType::CdpClimate, &[]),
        area(2021, ImpactArea::Water),
        area(2022, ImpactArea::Water),
        area(2022, ImpactArea::Energy),
    ]
}

#[test]
fn percentage_handles_empty_denominator() {
    assert_eq!(percentage(3, 0), 0.0);
    assert_eq!(percentage(1, 4), 25.0);
}

#[test]
fn language_strength_shares_close_to_one_hundred_per_year() {
    let rows = language_strength_matrix(&sample());

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].year, rows[0].strong, rows[0].weak), (2021, 1, 2));
    for row in &rows {
        let sum = CommitmentStrength::ALL
            .into_iter()
            .map(|strength| row.pct(strength))
            .sum::<f64>();
        assert!((sum - 100.0).abs() < 1e-9, "year {} sums to {sum}", row.year);
    }
}

#[test]
fn category_breakdown_is_relative_to_year_and_category() {
    let records = aggregate_by_category(&sample());

    let strong_2022 = records
        .iter()
        .find(|record| {
            record.year == 2022
                && record.subcategory == Some(Subcategory::Strength(CommitmentStrength::Strong))
        })
        .expect("strong 2022");
    assert_eq!(strong_2022.count, 2);
    assert!((strong_2022.pct_of_year_category_total - 200.0 / 3.0).abs() < 1e-9);

    let targets_2021 = records
        .iter()
        .find(|record| record.year == 2021 && record.category == Category::Target)
        .expect("targets 2021");
    assert_eq!(targets_2021.subcategory, None);
    assert_eq!(targets_2021.count, 2);
    assert_eq!(targets_2021.pct_of_year_category_total, 100.0);
}

#[test]
fn group_counts_cover_occurring_combinations_only() {
    let groups = group_counts(&sample(), &[GroupKey::Year, GroupKey::DocumentType]);

    let values = groups
        .iter()
        .map(|group| (group.values.join("|"), group.count))
        .collect::<Vec<_>>();
    assert_eq!(
        values,
        vec![
            ("2021|annual_filing".to_string(), 1),
            ("2021|cdp_water".to_string(), 1),
            ("2021|sustainability_report".to_string(), 4),
            ("2022|cdp_climate".to_string(), 2),
            ("2022|cdp_water".to_string(), 2),
            ("2022|sustainability_report".to_string(), 4),
        ]
    );
    assert_eq!(
        groups.iter().map(|group| group.count).sum::<usize>(),
        sample().len()
    );
}

#[test]
fn yearly_trend_reports_changes_between_years() {
    let mut findings = sample();
    findings.push(language(2023, CommitmentStrength::Weak));

    let trend = yearly_trend(&findings, Category::Target);

    assert_eq!(
        trend
            .iter()
            .map(|row| (row.year, row.count, row.yoy_change))
            .collect::<Vec<_>>(),
        vec![(2021, 2, None), (2022, 3, Some(1)), (2023, 0, Some(-3))]
    );
    assert_eq!(trend[1].yoy_pct_change, Some(50.0));
    assert_eq!(trend[2].yoy_pct_change, Some(-100.0));
}

#[test]
fn trend_after_a_zero_year_has_no_percentage() {
    let findings = vec![
        language(2020, CommitmentStrength::Weak),
        target(2021, DocumentType::SustainabilityReport, &[]),
    ];

    let trend = yearly_trend(&findings, Category::Target);

    assert_eq!(trend[1].yoy_change, Some(1));
    assert_eq!(trend[1].yoy_pct_change, None);
}

#[test]
fn quantification_splits_targets_by_numeric_values() {
    let rows = target_quantification(&sample());

    assert_eq!(rows.len(), 2);
    assert_eq!((rows[0].quantified, rows[0].qualitative), (1, 1));
    assert_eq!(rows[0].pct_quantified(), 50.0);
    assert_eq!((rows[1].quantified, rows[1].qualitative), (2, 1));
}

#[test]
fn disclosure_channel_lists_voluntary_types_first() {
    let rows = target_disclosure_channel(&sample());

    assert_eq!(rows.len(), DocumentType::ALL.len());
    assert!(rows[..5].iter().all(|row| row.channel == "voluntary"));
    assert_eq!(rows[5].document_type, DocumentType::AnnualFiling);
    assert_eq!(rows[5].channel, "mandatory");
    assert_eq!(rows[5].target_count, 1);
    assert_eq!(rows[5].pct_of_targets_with_known_type, 20.0);

    let total = rows
        .iter()
        .map(|row| row.pct_of_targets_with_known_type)
        .sum::<f64>();
    assert!((total - 100.0).abs() < 1e-9);
}

#[test]
fn impact_area_matrix_has_one_column_per_area() {
    let rows = impact_area_matrix(&sample());

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].count(ImpactArea::Water), 1);
    assert_eq!(rows[1].count(ImpactArea::Energy), 1);
    assert_eq!(rows[1].count(ImpactArea::Governance), 0);

    let csv = impact_area_csv(&sample());
    let header = csv.lines().next().expect("header");
    assert_eq!(header.split(',').count(), ImpactArea::ALL.len() + 1);
    assert!(header.starts_with("year,climate_carbon,water,"));
}

#[test]
fn summary_reports_headline_figures() {
    let summary = summarize(&sample());

    assert_eq!(summary.findings_total, 14);
    assert_eq!(summary.category_totals[0].category, Category::Target);
    assert_eq!(summary.category_totals[0].count, 5);
    assert_eq!(summary.language_strength[0].count, 3);
    assert_eq!(summary.language_strength[0].pct_of_language_total, 50.0);
    assert_eq!(summary.top_impact_areas[0].area, ImpactArea::Water);
    assert_eq!(summary.top_impact_areas[0].count, 2);
    assert_eq!(summary.targets_by_document_type.len(), 3);
}

#[test]
fn tables_render_fixed_precision_and_empty_cells() {
    let findings = sample();

    let breakdown = category_breakdown_csv(&findings);
    assert!(breakdown.lines().any(|line| line == "2021,target,,2,100.00"));

    let strength = language_strength_csv(&findings);
    assert_eq!(
        strength.lines().nth(1),
        Some("2021,1,0,2,3,33.33,0.00,66.67")
    );

    let trend = target_trend_csv(&findings);
    assert_eq!(trend.lines().nth(1), Some("2021,2,,"));
    assert_eq!(trend.lines().nth(2), Some("2022,3,1,50.00"));

    let channel = target_disclosure_channel_csv(&findings);
    assert_eq!(
        channel.lines().last(),
        Some("mandatory,annual_filing,1,20.00")
    );
}

#[test]
fn write_tables_creates_every_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output_dir = dir.path().join("tables");

    let written = write_tables(&output_dir, &sample()).expect("write tables");

    assert_eq!(written.len(), 7);
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }
}

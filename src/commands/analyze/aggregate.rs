use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::{
    AggregateRecord, Category, CommitmentStrength, DocumentType, Finding, ImpactArea, Qualifier,
    Subcategory,
};

const AREA_COUNT: usize = ImpactArea::ALL.len();

/// `part / whole` as a percentage; 0 when the denominator is empty.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Counts per (year, category, subcategory). Each percentage is relative to
/// the Findings of the same category in the same year.
pub fn aggregate_by_category(findings: &[Finding]) -> Vec<AggregateRecord> {
    let mut counts = BTreeMap::<(u32, Category, Option<Subcategory>), usize>::new();
    let mut totals = BTreeMap::<(u32, Category), usize>::new();

    for finding in findings {
        *counts
            .entry((finding.year, finding.category, finding.subcategory))
            .or_insert(0) += 1;
        *totals.entry((finding.year, finding.category)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((year, category, subcategory), count)| {
            let total = totals.get(&(year, category)).copied().unwrap_or(0);
            AggregateRecord {
                year,
                category,
                subcategory,
                count,
                pct_of_year_category_total: percentage(count, total),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Year,
    DocumentType,
    Category,
    Subcategory,
    Qualifier,
}

impl GroupKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::DocumentType => "document_type",
            Self::Category => "category",
            Self::Subcategory => "subcategory",
            Self::Qualifier => "qualifier",
        }
    }

    fn value(self, finding: &Finding) -> String {
        match self {
            Self::Year => finding.year.to_string(),
            Self::DocumentType => finding.document_type.as_str().to_string(),
            Self::Category => finding.category.as_str().to_string(),
            Self::Subcategory => finding
                .subcategory
                .map(|value| value.as_str().to_string())
                .unwrap_or_default(),
            Self::Qualifier => finding
                .qualifier
                .map(Qualifier::as_str)
                .unwrap_or_default()
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCount {
    pub values: Vec<String>,
    pub count: usize,
}

/// Finding counts for every combination of `keys` that occurs, sorted by key
/// values.
pub fn group_counts(findings: &[Finding], keys: &[GroupKey]) -> Vec<GroupCount> {
    let mut counts = BTreeMap::<Vec<String>, usize>::new();
    for finding in findings {
        let values = keys.iter().map(|key| key.value(finding)).collect();
        *counts.entry(values).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(values, count)| GroupCount { values, count })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrengthRow {
    pub year: u32,
    pub strong: usize,
    pub moderate: usize,
    pub weak: usize,
}

impl StrengthRow {
    pub fn total(&self) -> usize {
        self.strong + self.moderate + self.weak
    }

    pub fn count(&self, strength: CommitmentStrength) -> usize {
        match strength {
            CommitmentStrength::Strong => self.strong,
            CommitmentStrength::Moderate => self.moderate,
            CommitmentStrength::Weak => self.weak,
        }
    }

    /// Share of this year's Language Findings; the three tiers sum to 100.
    pub fn pct(&self, strength: CommitmentStrength) -> f64 {
        percentage(self.count(strength), self.total())
    }
}

pub fn language_strength_matrix(findings: &[Finding]) -> Vec<StrengthRow> {
    let mut rows = BTreeMap::<u32, StrengthRow>::new();
    for finding in findings {
        let Some(Subcategory::Strength(strength)) = finding.subcategory else {
            continue;
        };
        if finding.category != Category::Language {
            continue;
        }

        let row = rows.entry(finding.year).or_insert(StrengthRow {
            year: finding.year,
            strong: 0,
            moderate: 0,
            weak: 0,
        });
        match strength {
            CommitmentStrength::Strong => row.strong += 1,
            CommitmentStrength::Moderate => row.moderate += 1,
            CommitmentStrength::Weak => row.weak += 1,
        }
    }
    rows.into_values().collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaRow {
    pub year: u32,
    /// Indexed like `ImpactArea::ALL`.
    pub counts: [usize; AREA_COUNT],
}

impl AreaRow {
    pub fn count(&self, area: ImpactArea) -> usize {
        ImpactArea::ALL
            .iter()
            .position(|candidate| *candidate == area)
            .map(|index| self.counts[index])
            .unwrap_or(0)
    }
}

pub fn impact_area_matrix(findings: &[Finding]) -> Vec<AreaRow> {
    let mut rows = BTreeMap::<u32, AreaRow>::new();
    for finding in findings {
        let Some(Subcategory::Area(area)) = finding.subcategory else {
            continue;
        };
        let Some(index) = ImpactArea::ALL.iter().position(|candidate| *candidate == area) else {
            continue;
        };

        rows.entry(finding.year)
            .or_insert(AreaRow {
                year: finding.year,
                counts: [0; AREA_COUNT],
            })
            .counts[index] += 1;
    }
    rows.into_values().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRow {
    pub year: u32,
    pub count: usize,
    pub yoy_change: Option<i64>,
    pub yoy_pct_change: Option<f64>,
}

/// Per-year count of one category over every year that has any Finding.
/// The first year has no change; a change from zero has no percentage.
pub fn yearly_trend(findings: &[Finding], category: Category) -> Vec<TrendRow> {
    let years = findings
        .iter()
        .map(|finding| finding.year)
        .collect::<BTreeSet<u32>>();

    let mut rows = Vec::<TrendRow>::with_capacity(years.len());
    for year in years {
        let count = findings
            .iter()
            .filter(|finding| finding.year == year && finding.category == category)
            .count();
        let (yoy_change, yoy_pct_change) = match rows.last() {
            Some(previous) => {
                let change = count as i64 - previous.count as i64;
                let pct = (previous.count > 0)
                    .then(|| change as f64 * 100.0 / previous.count as f64);
                (Some(change), pct)
            }
            None => (None, None),
        };
        rows.push(TrendRow {
            year,
            count,
            yoy_change,
            yoy_pct_change,
        });
    }
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantificationRow {
    pub year: u32,
    pub quantified: usize,
    pub qualitative: usize,
}

impl QuantificationRow {
    pub fn pct_quantified(&self) -> f64 {
        percentage(self.quantified, self.quantified + self.qualitative)
    }
}

pub fn target_quantification(findings: &[Finding]) -> Vec<QuantificationRow> {
    let mut rows = BTreeMap::<u32, QuantificationRow>::new();
    for finding in findings {
        if finding.category != Category::Target {
            continue;
        }
        let row = rows.entry(finding.year).or_insert(QuantificationRow {
            year: finding.year,
            quantified: 0,
            qualitative: 0,
        });
        if finding.numeric_values.is_empty() {
            row.qualitative += 1;
        } else {
            row.quantified += 1;
        }
    }
    rows.into_values().collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRow {
    pub channel: &'static str,
    pub document_type: DocumentType,
    pub target_count: usize,
    pub pct_of_targets_with_known_type: f64,
}

/// Target Findings per document type, grouped into voluntary and mandatory
/// channels. Every document type is listed, including those with no targets.
pub fn target_disclosure_channel(findings: &[Finding]) -> Vec<ChannelRow> {
    let targets = findings
        .iter()
        .filter(|finding| finding.category == Category::Target)
        .collect::<Vec<_>>();

    let mut rows = DocumentType::ALL
        .into_iter()
        .map(|document_type| {
            let target_count = targets
                .iter()
                .filter(|finding| finding.document_type == document_type)
                .count();
            ChannelRow {
                channel: document_type.channel(),
                document_type,
                target_count,
                pct_of_targets_with_known_type: percentage(target_count, targets.len()),
            }
        })
        .collect::<Vec<_>>();

    rows.sort_by_key(|row| (!row.document_type.is_voluntary(), row.document_type));
    rows
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrengthTotal {
    pub strength: CommitmentStrength,
    pub count: usize,
    pub pct_of_language_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaTotal {
    pub area: ImpactArea,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearCount {
    pub year: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeCount {
    pub document_type: DocumentType,
    pub count: usize,
}

/// Headline figures written next to the tables.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub findings_total: usize,
    pub category_totals: Vec<CategoryTotal>,
    pub language_strength: Vec<StrengthTotal>,
    pub targets_by_year: Vec<YearCount>,
    pub targets_by_document_type: Vec<TypeCount>,
    /// Most frequent first, at most ten.
    pub top_impact_areas: Vec<AreaTotal>,
}

pub fn summarize(findings: &[Finding]) -> AnalysisSummary {
    let category_totals = Category::ALL
        .into_iter()
        .map(|category| CategoryTotal {
            category,
            count: findings
                .iter()
                .filter(|finding| finding.category == category)
                .count(),
        })
        .collect();

    let language_total = findings
        .iter()
        .filter(|finding| finding.category == Category::Language)
        .count();
    let language_strength = CommitmentStrength::ALL
        .into_iter()
        .map(|strength| {
            let count = findings
                .iter()
                .filter(|finding| {
                    finding.category == Category::Language
                        && finding.subcategory == Some(Subcategory::Strength(strength))
                })
                .count();
            StrengthTotal {
                strength,
                count,
                pct_of_language_total: percentage(count, language_total),
            }
        })
        .collect();

    let targets_by_year = yearly_trend(findings, Category::Target)
        .into_iter()
        .map(|row| YearCount {
            year: row.year,
            count: row.count,
        })
        .collect();

    let targets_by_document_type = target_disclosure_channel(findings)
        .into_iter()
        .filter(|row| row.target_count > 0)
        .map(|row| TypeCount {
            document_type: row.document_type,
            count: row.target_count,
        })
        .collect();

    let mut top_impact_areas = ImpactArea::ALL
        .into_iter()
        .map(|area| AreaTotal {
            area,
            count: findings
                .iter()
                .filter(|finding| finding.subcategory == Some(Subcategory::Area(area)))
                .count(),
        })
        .filter(|total| total.count > 0)
        .collect::<Vec<_>>();
    top_impact_areas.sort_by(|a, b| b.count.cmp(&a.count).then(a.area.cmp(&b.area)));
    top_impact_areas.truncate(10);

    AnalysisSummary {
        findings_total: findings.len(),
        category_totals,
        language_strength,
        targets_by_year,
        targets_by_document_type,
        top_impact_areas,
    }
}

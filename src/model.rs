use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_REPORT_YEAR: u32 = 2020;
pub const MAX_REPORT_YEAR: u32 = 2025;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    SustainabilityReport,
    AnnualFiling,
    CdpClimate,
    CdpWater,
    CdpForest,
    CarbonVerification,
}

impl DocumentType {
    pub const ALL: [DocumentType; 6] = [
        Self::SustainabilityReport,
        Self::AnnualFiling,
        Self::CdpClimate,
        Self::CdpWater,
        Self::CdpForest,
        Self::CarbonVerification,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SustainabilityReport => "sustainability_report",
            Self::AnnualFiling => "annual_filing",
            Self::CdpClimate => "cdp_climate",
            Self::CdpWater => "cdp_water",
            Self::CdpForest => "cdp_forest",
            Self::CarbonVerification => "carbon_verification",
        }
    }

    /// Short code used as the citation prefix, e.g. `GCS` in `GCS_2022:45`.
    pub fn code(self) -> &'static str {
        match self {
            Self::SustainabilityReport => "GCS",
            Self::AnnualFiling => "10K",
            Self::CdpClimate => "CDPC",
            Self::CdpWater => "CDPW",
            Self::CdpForest => "CDPF",
            Self::CarbonVerification => "CFV",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SustainabilityReport => "Global Citizenship & Sustainability Report",
            Self::AnnualFiling => "10-K Annual Report",
            Self::CdpClimate => "CDP Climate Change Disclosure",
            Self::CdpWater => "CDP Water Security Disclosure",
            Self::CdpForest => "CDP Forest Disclosure",
            Self::CarbonVerification => "Carbon Footprint Verification/Assurance",
        }
    }

    /// Annual filings are the only mandated channel; everything else is voluntary.
    pub fn is_voluntary(self) -> bool {
        !matches!(self, Self::AnnualFiling)
    }

    pub fn channel(self) -> &'static str {
        if self.is_voluntary() {
            "voluntary"
        } else {
            "mandatory"
        }
    }

    /// Filename keyword convention used by the inventory.
    pub fn classify_filename(filename: &str) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();

        if lower.contains("citizenship") || lower.contains("gcs") || lower.contains("sustainability")
        {
            Some(Self::SustainabilityReport)
        } else if lower.contains("10k") || lower.contains("10-k") {
            Some(Self::AnnualFiling)
        } else if lower.contains("cdp") && lower.contains("climate") {
            Some(Self::CdpClimate)
        } else if lower.contains("cdp") && lower.contains("water") {
            Some(Self::CdpWater)
        } else if lower.contains("cdp") && lower.contains("forest") {
            Some(Self::CdpForest)
        } else if lower.contains("carbon footprint")
            || lower.contains("carbon_footprint")
            || lower.contains("verification")
            || lower.contains("assurance")
        {
            Some(Self::CarbonVerification)
        } else {
            None
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value || kind.code().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown document type: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Primary,
    Fallback,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source file after extraction. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub source_file: String,
    pub sha256: String,
    pub year: u32,
    pub document_type: DocumentType,
    pub page_count: usize,
    pub extraction_method: ExtractionMethod,
    pub extracted_at: DateTime<Utc>,
    #[serde(default)]
    pub degenerate_page_count: usize,
}

impl Document {
    pub fn citation(&self, page_number: u32) -> String {
        citation(self.document_type, self.year, page_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub page_number: u32,
    pub raw_text: String,
}

/// `<DocumentTypeCode>_<Year>:<PageNumber>`
pub fn citation(document_type: DocumentType, year: u32, page_number: u32) -> String {
    format!("{}_{}:{}", document_type.code(), year, page_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Target,
    Language,
    Initiative,
    ImpactArea,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Self::Target,
        Self::Language,
        Self::Initiative,
        Self::ImpactArea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Language => "language",
            Self::Initiative => "initiative",
            Self::ImpactArea => "impact_area",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| format!("unknown category: {value}"))
    }
}

/// Declaration order doubles as tie-break order: later variants are weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentStrength {
    Strong,
    Moderate,
    Weak,
}

impl CommitmentStrength {
    pub const ALL: [CommitmentStrength; 3] = [Self::Strong, Self::Moderate, Self::Weak];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactArea {
    ClimateCarbon,
    Water,
    WasteCircularity,
    Energy,
    Materials,
    SupplyChain,
    HumanRightsLabor,
    DiversityEquity,
    Biodiversity,
    Governance,
}

impl ImpactArea {
    pub const ALL: [ImpactArea; 10] = [
        Self::ClimateCarbon,
        Self::Water,
        Self::WasteCircularity,
        Self::Energy,
        Self::Materials,
        Self::SupplyChain,
        Self::HumanRightsLabor,
        Self::DiversityEquity,
        Self::Biodiversity,
        Self::Governance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClimateCarbon => "climate_carbon",
            Self::Water => "water",
            Self::WasteCircularity => "waste_circularity",
            Self::Energy => "energy",
            Self::Materials => "materials",
            Self::SupplyChain => "supply_chain",
            Self::HumanRightsLabor => "human_rights_labor",
            Self::DiversityEquity => "diversity_equity",
            Self::Biodiversity => "biodiversity",
            Self::Governance => "governance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subcategory {
    Strength(CommitmentStrength),
    Area(ImpactArea),
}

impl Subcategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strength(strength) => strength.as_str(),
            Self::Area(area) => area.as_str(),
        }
    }
}

impl fmt::Display for Subcategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subcategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if let Some(strength) = CommitmentStrength::ALL
            .into_iter()
            .find(|strength| strength.as_str() == value)
        {
            return Ok(Self::Strength(strength));
        }

        ImpactArea::ALL
            .into_iter()
            .find(|area| area.as_str() == value)
            .map(Self::Area)
            .ok_or_else(|| format!("unknown subcategory: {value}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    Quantified,
    Qualitative,
    DowngradedFromStrong,
    DowngradedFromModerate,
    InvestmentDisclosed,
}

impl Qualifier {
    pub const ALL: [Qualifier; 5] = [
        Self::Quantified,
        Self::Qualitative,
        Self::DowngradedFromStrong,
        Self::DowngradedFromModerate,
        Self::InvestmentDisclosed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quantified => "quantified",
            Self::Qualitative => "qualitative",
            Self::DowngradedFromStrong => "downgraded_from_strong",
            Self::DowngradedFromModerate => "downgraded_from_moderate",
            Self::InvestmentDisclosed => "investment_disclosed",
        }
    }
}

impl FromStr for Qualifier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|qualifier| qualifier.as_str() == value)
            .ok_or_else(|| format!("unknown qualifier: {value}"))
    }
}

/// One page-localized match of a dictionary rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub document_id: String,
    pub document_type: DocumentType,
    pub year: u32,
    pub page_number: u32,
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub rule_id: String,
    pub matched_text: String,
    /// Disambiguates repeated identical matches on the same page.
    pub ordinal: u32,
    pub context_quote: String,
    pub numeric_values: Vec<String>,
    pub qualifier: Option<Qualifier>,
}

impl Finding {
    pub fn citation(&self) -> String {
        citation(self.document_type, self.year, self.page_number)
    }

    pub fn finding_id(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.document_id,
            self.page_number,
            self.category.as_str(),
            self.matched_text.to_lowercase(),
            self.ordinal
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRecord {
    pub year: u32,
    pub category: Category,
    pub subcategory: Option<Subcategory>,
    pub count: usize,
    pub pct_of_year_category_total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub document_id: String,
    /// Relative to the inventory's source directory.
    pub path: String,
    pub year: u32,
    pub document_type: DocumentType,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<DocumentEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionLogEntry {
    pub document_id: String,
    pub source_file: String,
    pub sha256: String,
    pub method: Option<ExtractionMethod>,
    pub success: bool,
    pub page_count: usize,
    #[serde(default)]
    pub degenerate_page_count: usize,
    #[serde(default)]
    pub fell_back: bool,
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionLogFile {
    pub log_version: u32,
    pub updated_at: String,
    pub entries: Vec<ExtractionLogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdfinfo: Option<String>,
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub documents_in_inventory: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub fell_back: usize,
    pub failed: usize,
    pub skipped_completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub document_id: String,
    pub source_file: String,
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractPaths {
    pub work_root: String,
    pub input_dir: String,
    pub inventory_manifest_path: String,
    pub corpus_dir: String,
    pub extraction_log_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub summary: RunSummary,
    pub failures: Vec<FailedDocument>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub updated_at: String,
    pub dictionary_version: String,
    pub dictionary_source: String,
    pub documents_tagged: usize,
    pub documents_rejected: usize,
    pub findings_total: usize,
    pub findings_by_category: Vec<CategoryCount>,
    pub db_path: String,
    pub export_path: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: usize,
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "esgscan",
    version,
    about = "Page-cited ESG disclosure extraction, tagging, and aggregation"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Patterns(PatternsArgs),
    Tag(TagArgs),
    Analyze(AnalyzeArgs),
    Status(StatusArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inventory(_) => "inventory",
            Self::Extract(_) => "extract",
            Self::Patterns(_) => "patterns",
            Self::Tag(_) => "tag",
            Self::Analyze(_) => "analyze",
            Self::Status(_) => "status",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = ".cache/esgscan")]
    pub work_root: PathBuf,

    #[arg(long, default_value = "extracted_reports")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".cache/esgscan")]
    pub work_root: PathBuf,

    #[arg(long, default_value = "extracted_reports")]
    pub input_dir: PathBuf,

    #[arg(long)]
    pub inventory_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub extract_manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub refresh_inventory: bool,

    /// Re-extract documents the extraction log already records as succeeded.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    /// Pages with fewer non-whitespace characters count as degenerate.
    #[arg(long, default_value_t = 40)]
    pub min_page_chars: usize,

    /// Retry with OCR when more than this fraction of pages is degenerate.
    #[arg(long, default_value_t = 0.5)]
    pub max_degenerate_fraction: f64,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long)]
    pub jobs: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct PatternsArgs {
    #[arg(long)]
    pub patterns_path: Option<PathBuf>,

    /// Write the built-in dictionary to this path as a starting point.
    #[arg(long)]
    pub write_default: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[arg(long, default_value = ".cache/esgscan")]
    pub work_root: PathBuf,

    #[arg(long)]
    pub patterns_path: Option<PathBuf>,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub findings_csv_path: Option<PathBuf>,

    #[arg(long)]
    pub tag_manifest_path: Option<PathBuf>,

    #[arg(long)]
    pub jobs: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(long, default_value = ".cache/esgscan")]
    pub work_root: PathBuf,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/esgscan")]
    pub work_root: PathBuf,
}

use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result, bail};

use crate::model::{ExtractionMethod, ToolVersions};

/// One way of turning a PDF into per-page text.
///
/// Page `i` of the returned vector is PDF page `i + 1`. Empty strings are
/// valid pages; implementations must not drop them.
pub trait PageBackend: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Backend identifier for logs.
    fn name(&self) -> &str;

    fn extract_pages(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<String>>;
}

/// Poppler text layer.
#[derive(Debug, Default, Clone)]
pub struct PdftotextBackend;

impl PdftotextBackend {
    pub fn new() -> Self {
        Self
    }
}

impl PageBackend for PdftotextBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Primary
    }

    fn name(&self) -> &str {
        "pdftotext"
    }

    fn extract_pages(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<String>> {
        let mut command = Command::new("pdftotext");
        command.args(["-enc", "UTF-8", "-f", "1"]);
        if let Some(max_pages) = max_pages {
            command.arg("-l").arg(max_pages.to_string());
        }
        command.arg(pdf_path).arg("-");

        let output = run_tool(&mut command, "pdftotext", pdf_path)?;
        Ok(split_form_feed_pages(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// pdftotext ends every page with a form feed, so the chunk after the last
/// one is a trailer rather than a page. Blank pages in between are kept.
pub(super) fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    if pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }

    pages
}

/// Whole-document OCR: `pdfinfo` for the page count, then `pdftoppm` and
/// `tesseract` per page.
#[derive(Debug, Clone)]
pub struct OcrBackend {
    lang: String,
}

impl OcrBackend {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }
}

impl PageBackend for OcrBackend {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Fallback
    }

    fn name(&self) -> &str {
        "ocr"
    }

    fn extract_pages(&self, pdf_path: &Path, max_pages: Option<usize>) -> Result<Vec<String>> {
        if !command_available("pdftoppm") || !command_available("tesseract") {
            bail!(
                "OCR fallback requested for {} but pdftoppm/tesseract are unavailable",
                pdf_path.display()
            );
        }

        let info = run_tool(Command::new("pdfinfo").arg(pdf_path), "pdfinfo", pdf_path)?;
        let mut page_count = parse_pdfinfo_pages(&String::from_utf8_lossy(&info.stdout))
            .with_context(|| format!("pdfinfo reported no page count for {}", pdf_path.display()))?;
        if let Some(max_pages) = max_pages {
            page_count = page_count.min(max_pages);
        }

        // Rendered page images live only as long as this directory.
        let scratch = tempfile::Builder::new()
            .prefix("esgscan_ocr_")
            .tempdir()
            .context("failed to create OCR scratch directory")?;

        (1..=page_count)
            .map(|page_number| self.ocr_page(pdf_path, scratch.path(), page_number))
            .collect()
    }
}

impl OcrBackend {
    fn ocr_page(&self, pdf_path: &Path, scratch: &Path, page_number: usize) -> Result<String> {
        let image_root = scratch.join(format!("page_{page_number}"));
        let page = page_number.to_string();

        run_tool(
            Command::new("pdftoppm")
                .args(["-f", page.as_str(), "-l", page.as_str(), "-r", "300", "-singlefile", "-png"])
                .arg(pdf_path)
                .arg(&image_root),
            "pdftoppm",
            pdf_path,
        )?;

        let image_path = image_root.with_extension("png");
        if !image_path.exists() {
            bail!(
                "pdftoppm did not produce an image for {} page {}",
                pdf_path.display(),
                page_number
            );
        }

        let output = run_tool(
            Command::new("tesseract")
                .arg(&image_path)
                .arg("stdout")
                .arg("-l")
                .arg(&self.lang),
            "tesseract",
            pdf_path,
        )?;

        Ok(String::from_utf8_lossy(&output.stdout)
            .replace('\u{0000}', "")
            .trim()
            .to_string())
    }
}

/// Runs an external tool and turns a spawn failure or non-zero exit into an
/// error naming the tool and the document.
fn run_tool(command: &mut Command, program: &str, pdf_path: &Path) -> Result<Output> {
    let output = command
        .output()
        .with_context(|| format!("failed to execute {program} for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{program} exited with {} for {}: {}",
            output.status,
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(output)
}

pub(super) fn parse_pdfinfo_pages(raw: &str) -> Option<usize> {
    raw.lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|value| value.trim().parse::<usize>().ok())
}

fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

pub fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        pdftotext: command_version_optional("pdftotext", &["-v"]),
        pdfinfo: command_version_optional("pdfinfo", &["-v"]),
        pdftoppm: command_version_optional("pdftoppm", &["-v"]),
        tesseract: command_version_optional("tesseract", &["--version"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}

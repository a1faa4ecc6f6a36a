//! The compatibility table: which (source extension, target format) pairs
//! the server will convert, and which operation handles each pair.
//!
//! The table is an immutable value built once at startup and handed to the
//! [`crate::convert::Converter`]. Lookups normalise their inputs
//! (lower-case, trimmed, leading dot stripped), so `".PNG"` and `"png"`
//! resolve identically.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A format the client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Jpg,
    Docx,
}

impl TargetFormat {
    /// Parse a user-supplied target string. Case- and whitespace-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Some(TargetFormat::Pdf),
            "jpg" => Some(TargetFormat::Jpg),
            "docx" => Some(TargetFormat::Docx),
            _ => None,
        }
    }

    /// File extension of produced files, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Jpg => "jpg",
            TargetFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// The four conversion operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionKind {
    /// docx / pptx / xlsx → pdf via the office renderer.
    OfficeToPdf,
    /// First PDF page → JPEG via the configured rasterizer.
    PdfToImage,
    /// pdf → docx via the office renderer's PDF import filter.
    PdfToDocx,
    /// jpg / jpeg / png → single-page PDF via PDFium.
    ImageToPdf,
}

impl ConversionKind {
    /// `true` when the operation writes into a dedicated output directory
    /// rather than a single output file.
    pub fn produces_directory(self) -> bool {
        matches!(self, ConversionKind::PdfToImage)
    }
}

/// One legal (source extension, target format) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub source_ext: String,
    pub target: TargetFormat,
    pub kind: ConversionKind,
}

/// Immutable, ordered list of allowed conversions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityTable {
    rules: Vec<CompatibilityRule>,
}

impl CompatibilityTable {
    /// Build a table from explicit rules. Source extensions are normalised.
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, TargetFormat, ConversionKind)>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|(ext, target, kind)| CompatibilityRule {
                source_ext: normalise_ext(ext.as_ref()),
                target,
                kind,
            })
            .collect();
        Self { rules }
    }

    /// The table the server ships with.
    ///
    /// | Source | Target | Operation |
    /// |--------|--------|-----------|
    /// | docx, pptx, xlsx | pdf | office renderer |
    /// | pdf | jpg | rasterizer (first page) |
    /// | pdf | docx | office renderer, PDF import filter |
    /// | jpg, jpeg, png | pdf | PDFium image embedding |
    pub fn standard() -> Self {
        use ConversionKind::*;
        use TargetFormat::*;
        Self::new([
            ("docx", Pdf, OfficeToPdf),
            ("pptx", Pdf, OfficeToPdf),
            ("xlsx", Pdf, OfficeToPdf),
            ("pdf", Jpg, PdfToImage),
            ("pdf", Docx, PdfToDocx),
            ("jpg", Pdf, ImageToPdf),
            ("jpeg", Pdf, ImageToPdf),
            ("png", Pdf, ImageToPdf),
        ])
    }

    /// Find the operation for a pair. `target` is the raw client string.
    pub fn lookup(&self, source_ext: &str, target: &str) -> Option<&CompatibilityRule> {
        let target = TargetFormat::parse(target)?;
        let ext = normalise_ext(source_ext);
        self.rules
            .iter()
            .find(|r| r.source_ext == ext && r.target == target)
    }

    /// Human-readable list of supported pairs, e.g. `"docx → pdf, pdf → jpg"`.
    pub fn describe(&self) -> String {
        self.rules
            .iter()
            .map(|r| format!("{} → {}", r.source_ext, r.target))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn rules(&self) -> &[CompatibilityRule] {
        &self.rules
    }
}

impl Default for CompatibilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalise_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

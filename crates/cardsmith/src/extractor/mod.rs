pub mod docx;
pub mod pdf;
pub mod pptx;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Supported upload formats, detected from the declared filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Pptx,
    Text,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "txt" | "md" => Some(DocumentFormat::Text),
            _ => None,
        }
    }
}

/// A page-tagged block of extracted text. Page numbers are 1-based and
/// monotonically increasing within a document; empty pages are dropped
/// before a block is ever created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBlock {
    pub page_number: u32,
    pub text: String,
}

impl PageBlock {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
        }
    }
}

/// Format-specific text extraction over raw bytes. Pure: the same bytes
/// always yield the same block sequence.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageBlock>, ExtractError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ExtractorRegistry {
    extractors: Vec<Box<dyn DocumentExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        let extractors: Vec<Box<dyn DocumentExtractor>> = vec![
            Box::new(text::TextExtractor::new()),
            Box::new(pdf::PdfExtractor::new()),
            Box::new(docx::DocxExtractor::new()),
            Box::new(pptx::PptxExtractor::new()),
        ];

        Self { extractors }
    }

    /// Routes `bytes` to the extractor matching the declared filename's
    /// extension. Unknown extensions fail with `UnsupportedFormat`.
    pub fn extract(
        &self,
        bytes: &[u8],
        declared_filename: &str,
    ) -> Result<Vec<PageBlock>, ExtractError> {
        let extension = std::path::Path::new(declared_filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ExtractError::UnsupportedFormat(extension.to_string()))?;

        for extractor in &self.extractors {
            if extractor.supports(format) {
                return extractor.extract(bytes);
            }
        }

        Err(ExtractError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

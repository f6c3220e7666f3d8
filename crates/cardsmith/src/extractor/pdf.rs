use crate::error::ExtractError;
use crate::extractor::{DocumentExtractor, DocumentFormat, PageBlock};

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageBlock>, ExtractError> {
        let _span = tracing::info_span!("extractor.pdf").entered();

        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;

        let mut blocks = Vec::new();

        for (page_number, _) in doc.get_pages() {
            match doc.extract_text(&[page_number]) {
                Ok(page_text) => {
                    if !page_text.trim().is_empty() {
                        blocks.push(PageBlock::new(page_number, page_text));
                    }
                }
                Err(e) => {
                    // A single unreadable page does not abort the document.
                    tracing::warn!(page = page_number, "failed to extract page text: {}", e);
                }
            }
        }

        tracing::debug!(pages = blocks.len(), "extracted PDF");

        Ok(blocks)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

use crate::error::ExtractError;
use crate::extractor::{DocumentExtractor, DocumentFormat, PageBlock};

/// Plain text has no pages; fixed line groups give citations an anchor.
const LINES_PER_PAGE: usize = 50;

pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for TextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageBlock>, ExtractError> {
        let content = String::from_utf8_lossy(bytes);
        let lines: Vec<&str> = content.lines().collect();

        let mut blocks = Vec::new();

        for (i, window) in lines.chunks(LINES_PER_PAGE).enumerate() {
            let page_text = window.join("\n");
            if !page_text.trim().is_empty() {
                blocks.push(PageBlock::new((i + 1) as u32, page_text));
            }
        }

        Ok(blocks)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}

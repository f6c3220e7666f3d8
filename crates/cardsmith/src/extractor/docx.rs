use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::ExtractError;
use crate::extractor::{DocumentExtractor, DocumentFormat, PageBlock};

/// DOCX has no native page concept, so paragraphs are grouped into synthetic
/// pages by character budget; the page numbers exist only to give citations
/// a stable anchor.
const SYNTHETIC_PAGE_CHARS: usize = 4000;

pub struct DocxExtractor;

impl DocxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for DocxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageBlock>, ExtractError> {
        let _span = tracing::info_span!("extractor.docx").entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractError::Docx(format!("Failed to open DOCX: {}", e)))?;

        let mut document_xml = archive
            .by_name("word/document.xml")
            .map_err(|e| ExtractError::Docx(format!("Failed to find document.xml: {}", e)))?;

        let mut xml_content = String::new();
        document_xml
            .read_to_string(&mut xml_content)
            .map_err(|e| ExtractError::Docx(format!("Failed to read document.xml: {}", e)))?;

        let paragraphs = parse_paragraphs(&xml_content)?;
        let blocks = group_into_pages(&paragraphs);

        tracing::debug!(paragraphs = paragraphs.len(), pages = blocks.len(), "extracted DOCX");

        Ok(blocks)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Docx)
    }
}

/// Collects paragraph text from `word/document.xml`. Text runs (`w:t`) inside
/// table cells are regular paragraphs in WordprocessingML, so table content
/// comes along without special handling.
fn parse_paragraphs(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_element = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_element = true;
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_element = false,
                b"p" => {
                    let text = current.trim();
                    if !text.is_empty() {
                        paragraphs.push(text.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_text_element {
                    let decoded = e
                        .decode()
                        .ok()
                        .and_then(|s| {
                            quick_xml::escape::unescape(&s)
                                .ok()
                                .map(|u| u.into_owned())
                        })
                        .unwrap_or_default();
                    current.push_str(&decoded);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Docx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        paragraphs.push(trailing.to_string());
    }

    Ok(paragraphs)
}

fn group_into_pages(paragraphs: &[String]) -> Vec<PageBlock> {
    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0usize;
    let mut page_number = 1u32;

    for paragraph in paragraphs {
        let len = paragraph.chars().count();
        if !current.is_empty() && current_len + len > SYNTHETIC_PAGE_CHARS {
            blocks.push(PageBlock::new(page_number, current.join("\n")));
            page_number += 1;
            current.clear();
            current_len = 0;
        }
        current.push(paragraph);
        current_len += len;
    }

    if !current.is_empty() {
        blocks.push(PageBlock::new(page_number, current.join("\n")));
    }

    blocks
}

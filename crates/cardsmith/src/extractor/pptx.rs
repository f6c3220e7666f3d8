use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use crate::error::ExtractError;
use crate::extractor::{DocumentExtractor, DocumentFormat, PageBlock};

pub struct PptxExtractor;

impl PptxExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PptxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentExtractor for PptxExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Vec<PageBlock>, ExtractError> {
        let _span = tracing::info_span!("extractor.pptx").entered();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractError::Pptx(format!("Failed to open PPTX: {}", e)))?;

        // Slide entries are not stored in presentation order; sort by the
        // number embedded in the entry name.
        let slide_pattern = Regex::new(r"^ppt/slides/slide(\d+)\.xml$")
            .map_err(|e| ExtractError::Pptx(format!("Invalid slide pattern: {}", e)))?;

        let mut slide_entries: Vec<(u32, String)> = archive
            .file_names()
            .filter_map(|name| {
                slide_pattern
                    .captures(name)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .map(|n| (n, name.to_string()))
            })
            .collect();
        slide_entries.sort_by_key(|(n, _)| *n);

        if slide_entries.is_empty() {
            return Err(ExtractError::Pptx(
                "No slides found in presentation".to_string(),
            ));
        }

        let mut blocks = Vec::new();

        for (slide_number, entry_name) in slide_entries {
            let mut slide_xml = String::new();
            archive
                .by_name(&entry_name)
                .map_err(|e| ExtractError::Pptx(format!("Failed to read {}: {}", entry_name, e)))?
                .read_to_string(&mut slide_xml)
                .map_err(|e| ExtractError::Pptx(format!("Failed to read {}: {}", entry_name, e)))?;

            let text = parse_slide_text(&slide_xml)?;
            if !text.trim().is_empty() {
                blocks.push(PageBlock::new(slide_number, text));
            }
        }

        tracing::debug!(slides = blocks.len(), "extracted PPTX");

        Ok(blocks)
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pptx)
    }
}

/// Collects `a:t` text runs from a slide, one line per paragraph (`a:p`).
/// Covers both shape text bodies and table cells.
fn parse_slide_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines = Vec::new();
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
                    let line = current.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
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
                return Err(ExtractError::Pptx(format!("XML parsing error: {}", e)));
            }
            _ => {}
        }
    }

    let trailing = current.trim();
    if !trailing.is_empty() {
        lines.push(trailing.to_string());
    }

    Ok(lines.join("\n"))
}

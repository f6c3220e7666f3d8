use tracing::warn;

use crate::extractor::PageBlock;

/// Appended when a single page exceeds the whole chunk budget.
const TRUNCATION_MARKER: &str = "\n\n[Content truncated]";

/// Separator used when concatenating page blocks into one prompt body.
const PAGE_SEPARATOR_LEN: usize = 2;

/// A page-bounded slice of a document sized to fit one generation call.
/// Never empty; `min_page()`/`max_page()` carry the citation range even when
/// content spans chunk edges.
#[derive(Debug, Clone)]
pub struct Chunk {
    blocks: Vec<PageBlock>,
    truncated: bool,
}

impl Chunk {
    fn new(blocks: Vec<PageBlock>, truncated: bool) -> Self {
        Self { blocks, truncated }
    }

    pub fn blocks(&self) -> &[PageBlock] {
        &self.blocks
    }

    pub fn min_page(&self) -> u32 {
        self.blocks.first().map_or(0, |b| b.page_number)
    }

    pub fn max_page(&self) -> u32 {
        self.blocks.last().map_or(0, |b| b.page_number)
    }

    /// Concatenated text length in characters, counting the separators used
    /// when the chunk is rendered into a prompt.
    pub fn char_len(&self) -> usize {
        let text: usize = self.blocks.iter().map(|b| b.text.chars().count()).sum();
        let separators = self.blocks.len().saturating_sub(1) * PAGE_SEPARATOR_LEN;
        text + separators
    }

    /// True when this chunk holds a single page that had to be cut down to
    /// the budget. The citation range is still valid; coverage is not.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Greedily packs consecutive page blocks into chunks of at most
/// `budget_chars` characters. A single block larger than the budget becomes
/// its own truncated chunk rather than being dropped, so every page stays
/// citable.
pub fn chunk_pages(blocks: &[PageBlock], budget_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<PageBlock> = Vec::new();
    let mut current_len = 0usize;

    for block in blocks {
        let block_len = block.text.chars().count();

        if block_len > budget_chars {
            if !current.is_empty() {
                chunks.push(Chunk::new(std::mem::take(&mut current), false));
                current_len = 0;
            }
            warn!(
                page = block.page_number,
                chars = block_len,
                budget = budget_chars,
                "page exceeds chunk budget; truncating"
            );
            chunks.push(Chunk::new(vec![truncate_block(block, budget_chars)], true));
            continue;
        }

        let separator = if current.is_empty() {
            0
        } else {
            PAGE_SEPARATOR_LEN
        };
        if !current.is_empty() && current_len + separator + block_len > budget_chars {
            chunks.push(Chunk::new(std::mem::take(&mut current), false));
            current_len = 0;
        }

        let separator = if current.is_empty() {
            0
        } else {
            PAGE_SEPARATOR_LEN
        };
        current_len += separator + block_len;
        current.push(block.clone());
    }

    if !current.is_empty() {
        chunks.push(Chunk::new(current, false));
    }

    chunks
}

fn truncate_block(block: &PageBlock, budget_chars: usize) -> PageBlock {
    let marker_len = TRUNCATION_MARKER.chars().count();
    let keep = budget_chars.saturating_sub(marker_len);

    let mut text: String = block.text.chars().take(keep).collect();
    text.push_str(TRUNCATION_MARKER);

    PageBlock::new(block.page_number, text)
}

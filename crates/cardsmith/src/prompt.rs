use std::fmt::Write;

use crate::chunker::Chunk;

/// A rendered generation request. Providers that distinguish system and user
/// roles send the parts separately; single-prompt backends use
/// [`Prompt::combined`].
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Renders the instruction block and the chunk content into a prompt.
/// Pure string templating; no calls, no state.
pub fn build_prompt(chunk: &Chunk, display_name: &str, max_cards: usize) -> Prompt {
    Prompt {
        system: build_system_part(display_name, max_cards),
        user: build_user_part(chunk, display_name),
    }
}

fn build_system_part(display_name: &str, max_cards: usize) -> String {
    format!(
        r#"You are an expert educational content creator specializing in generating high-quality flashcards from academic materials.

Your task is to analyze the provided document and create up to {max_cards} flashcards that:
1. Focus on key concepts, definitions, and important relationships
2. Use clear, concise language appropriate for the subject matter
3. Include precise source attribution for EVERY flashcard

CRITICAL SOURCE ATTRIBUTION REQUIREMENT:
- Every flashcard MUST include a "source" field
- Format: "{display_name} - Page X" or "{display_name} - Page X, Section Y"
- The source must reference the specific page where the information appears
- This is MANDATORY and non-negotiable

Output Format:
Return a JSON object with a "flashcards" array. Each flashcard must have:
- "question": Clear, focused question
- "answer": Comprehensive but concise answer
- "source": REQUIRED precise reference to document page/section

Example:
{{
    "flashcards": [
        {{
            "question": "What is photosynthesis?",
            "answer": "The process by which plants convert light energy into chemical energy (glucose) using carbon dioxide and water, releasing oxygen as a byproduct.",
            "source": "{display_name} - Page 12, Section 3.2"
        }}
    ]
}}

Quality Guidelines:
- Focus on understanding, not memorization
- Create questions at different difficulty levels
- Ensure answers are accurate and complete
- Avoid overly broad or vague questions
- Each flashcard should be self-contained"#
    )
}

fn build_user_part(chunk: &Chunk, display_name: &str) -> String {
    let mut user = String::from("Document content, labeled by page:\n\n");

    // Writing into a String cannot fail; the Results are discarded.
    for block in chunk.blocks() {
        let _ = writeln!(user, "[Page {}]", block.page_number);
        user.push_str(&block.text);
        user.push_str("\n\n");
    }

    let _ = write!(
        user,
        "Generate flashcards from the content above. Every \"source\" must cite {} and a page number between {} and {}.",
        display_name,
        chunk.min_page(),
        chunk.max_page()
    );

    user
}

//! System prompts for the formatting and vision-OCR calls.
//!
//! Keeping every prompt here means a wording change touches exactly one
//! place, and tests can inspect the prompts without calling a model.
//!
//! Callers can override the formatting prompt via
//! [`crate::config::NotesConfig::system_prompt`]; the constants here are used
//! only when no override is provided.

/// Default system prompt for turning raw lecture text into Markdown notes.
///
/// This prompt is used when `NotesConfig::system_prompt` is `None`.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an assistant that formats text extracted from class lectures into Markdown notes.

Structure the text properly:
   - Use # for the lecture title (at most one), ## for sections, ### for subsections
   - Use - for bullet points and 1. 2. 3. for ordered steps
   - Use **bold** for key terms and definitions
   - Wrap code in triple backticks with a language identifier when you can tell it

Restrictions:
1. If there are missing words, fill the gaps, but do not change the grammar or wording unless needed to fix OCR errors.
2. If there are invented words, correct them appropriately.
3. If there are nonsense characters, remove them.
4. Do not add any commentary or remarks. Output ONLY the formatted Markdown.
5. Do NOT wrap the answer in ```markdown fences.

The user message is the extracted text."#;

/// System prompt used when a vision model acts as the OCR engine.
///
/// The answer is treated as raw text and goes through the normal formatting
/// step afterwards, so the model must not structure or summarise it.
pub const VISION_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe all text visible in the image exactly as written, in natural reading order.

Rules:
- Return ONLY the transcribed text
- Do not add Markdown, headings, or commentary
- Do not summarise, translate, or correct the content
- Keep line breaks where the original clearly breaks lines
- If the image contains no text, return nothing"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_prompt_forbids_commentary_and_fences() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("Do not add any commentary"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("```markdown"));
    }

    #[test]
    fn ocr_prompt_asks_for_text_only() {
        assert!(VISION_OCR_PROMPT.contains("ONLY the transcribed text"));
        assert!(!VISION_OCR_PROMPT.contains('#'));
    }
}

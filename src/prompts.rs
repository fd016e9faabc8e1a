//! Prompts for the script, quiz and OCR calls.
//!
//! Every prompt lives here so the call sites in [`crate::pipeline::generate`]
//! and [`crate::pipeline::ocr`] only deal with retries and parsing, and so
//! tests can inspect prompt text without a provider.

/// System prompt for podcast script generation.
pub const SCRIPT_SYSTEM_PROMPT: &str = r#"You turn source material into a conversational podcast script between two speakers.

Rules:
- Speaker 1 is the Host, named Alice.
- Speaker 2 is the Guest, named John.
- Introduce them once at the beginning: Alice is the host and John is the guest.
- Keep it conversational and engaging, and stay faithful to the content.
- No background sounds, music, or stage directions.
- Output only plain dialogue, one utterance per line, each line starting with
  exactly "Host:" or "Guest:"."#;

/// Wrap extracted document text for the script call.
pub fn script_user_prompt(content: &str) -> String {
    format!("Convert the following content into the podcast script.\n\nContent:\n{content}")
}

/// System prompt for quiz generation. `{count}` is replaced at call time.
const QUIZ_SYSTEM_PROMPT_TEMPLATE: &str = r#"You write multiple-choice quizzes that test understanding of a text.

Return ONLY a JSON array with exactly {count} objects of this shape:
{"question": "...", "options": ["...", "...", "...", "..."], "correctAnswer": 0, "explanation": "..."}

Rules:
- Exactly four options per question.
- "correctAnswer" is the 0-based index of the correct option.
- Questions must be answerable from the text alone.
- No Markdown, no commentary, no code fences."#;

/// Build the quiz system prompt for `count` questions.
pub fn quiz_system_prompt(count: usize) -> String {
    QUIZ_SYSTEM_PROMPT_TEMPLATE.replace("{count}", &count.to_string())
}

/// Wrap extracted document text for the quiz call.
pub fn quiz_user_prompt(content: &str) -> String {
    format!("Generate the quiz from the following text:\n\n{content}")
}

/// Marker the OCR model returns for images without legible text.
pub const OCR_NO_TEXT: &str = "NO_TEXT";

/// System prompt for transcribing an embedded image.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of legible text in the image, in natural reading order.

Rules:
- Output ONLY the transcribed text, as plain text.
- Do not describe the image and do not add commentary.
- Do not use Markdown formatting.
- If the image contains no legible text, output exactly: NO_TEXT"#;

/// Truncate `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_prompt_demands_labels() {
        assert!(SCRIPT_SYSTEM_PROMPT.contains("\"Host:\""));
        assert!(SCRIPT_SYSTEM_PROMPT.contains("\"Guest:\""));
        assert!(script_user_prompt("abc").ends_with("abc"));
    }

    #[test]
    fn quiz_prompt_substitutes_count() {
        let p = quiz_system_prompt(7);
        assert!(p.contains("exactly 7 objects"));
        assert!(!p.contains("{count}"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}

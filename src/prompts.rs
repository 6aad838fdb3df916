//! Fixed instructions sent with every analysis request.
//!
//! Keeping the prompt text here, rather than inline in the request builder,
//! means prompt changes touch exactly one file and unit tests can inspect
//! the strings without a network round-trip.
//!
//! Callers override either string through
//! [`crate::config::AnalysisConfig::system_instruction`] and
//! [`crate::config::AnalysisConfig::user_prompt`].

use chrono::NaiveDate;

/// Default system instruction.
///
/// Asks for the report layout [`crate::pipeline::transcribe::parse`]
/// understands: bold-wrapped lines for section headings, hyphen bullets,
/// plain paragraphs.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are a careful medical imaging assistant. You review a single uploaded scan (ECG, X-ray, CT or MRI slice) and write a structured preliminary report for a clinician.

Format rules:
- Put each section title on its own line wrapped in double asterisks, e.g. **Findings**
- Write list items on their own line starting with "- "
- Write everything else as short plain paragraphs
- Do not use tables, code blocks or # headings

You never give a definitive diagnosis. You always remind the reader to consult a qualified medical professional."#;

/// Default user prompt. `{date}` is replaced with the submission date.
pub const DEFAULT_USER_PROMPT: &str = r#"Analyze this medical scan image and provide a detailed report.
- Mention any abnormalities or possible diseases.
- Give clear, structured analysis.
- If unsure, mention 'Unable to determine from the image'.
- Include recommendations and caution about consulting a medical professional.
Date: {date}"#;

/// Fill the `{date}` placeholder of a user prompt template.
///
/// Templates without the placeholder are returned unchanged.
pub fn user_prompt_for(template: &str, date: NaiveDate) -> String {
    template.replace("{date}", &date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_placeholder_filled() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let prompt = user_prompt_for(DEFAULT_USER_PROMPT, date);
        assert!(prompt.ends_with("Date: 2024-03-09"));
        assert!(!prompt.contains("{date}"));
    }

    #[test]
    fn template_without_placeholder_unchanged() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(user_prompt_for("Describe the scan.", date), "Describe the scan.");
    }

    #[test]
    fn system_instruction_describes_heading_syntax() {
        assert!(DEFAULT_SYSTEM_INSTRUCTION.contains("**Findings**"));
    }
}

//! Transcription: loosely structured model text → ordered [`ReportBlock`]s.
//!
//! The model is asked for bold-wrapped section titles, hyphen bullets and
//! plain paragraphs, but nothing guarantees it complies, so the rules are
//! line-local and total: every input produces a block list, and no line can
//! affect how another line is classified.
//!
//! Rules, first match wins, applied to each line after trimming:
//!
//! 1. blank → skipped (no block, and it does not close anything)
//! 2. starts and ends with `**` → [`ReportBlock::Heading`] at [`HEADING_LEVEL`]
//! 3. starts with `-` → [`ReportBlock::BulletItem`]
//! 4. anything else → [`ReportBlock::Paragraph`]
//!
//! Rule 2 is checked before rule 3, so `**- note**` is a heading.

use serde::{Deserialize, Serialize};

/// Heading level assigned to every bold-wrapped line.
///
/// Level 1 is used by the exporter for its own "image" section, so report
/// sections sit one level below it.
pub const HEADING_LEVEL: u8 = 2;

const BOLD: &str = "**";

/// One structural unit of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportBlock {
    Heading { level: u8, text: String },
    BulletItem { text: String },
    Paragraph { text: String },
}

impl ReportBlock {
    pub fn heading(text: impl Into<String>) -> Self {
        ReportBlock::Heading {
            level: HEADING_LEVEL,
            text: text.into(),
        }
    }

    pub fn bullet(text: impl Into<String>) -> Self {
        ReportBlock::BulletItem { text: text.into() }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        ReportBlock::Paragraph { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            ReportBlock::Heading { text, .. }
            | ReportBlock::BulletItem { text }
            | ReportBlock::Paragraph { text } => text,
        }
    }
}

/// Transcribe `text` into blocks, one per non-blank line, in source order.
pub fn parse(text: &str) -> Vec<ReportBlock> {
    text.split('\n').filter_map(classify).collect()
}

fn classify(line: &str) -> Option<ReportBlock> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with(BOLD) && line.ends_with(BOLD) {
        // "**" alone matches both ends with the same two characters.
        let inner = if line.len() >= 2 * BOLD.len() {
            &line[BOLD.len()..line.len() - BOLD.len()]
        } else {
            ""
        };
        return Some(ReportBlock::heading(inner.trim()));
    }

    if let Some(rest) = line.strip_prefix('-') {
        return Some(ReportBlock::bullet(rest.trim()));
    }

    Some(ReportBlock::paragraph(line))
}

//! Word export: [`Report`] → `.docx` bytes.
//!
//! A `.docx` file is a ZIP package of WordprocessingML parts. We write the
//! minimum set Word, LibreOffice and Google Docs all open cleanly:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! word/document.xml            body: title, blocks, image section
//! word/styles.xml              Title, Heading1..6, ListBullet
//! word/numbering.xml           one bullet list definition
//! word/_rels/document.xml.rels
//! word/media/image1.{png,jpeg} the original upload, untouched
//! ```
//!
//! Everything is assembled in memory; nothing touches the file system.

use crate::config::AnalysisConfig;
use crate::error::ScanReportError;
use crate::output::Report;
use crate::pipeline::render::{ReportRenderer, IMAGE_SECTION_HEADING, REPORT_TITLE};
use crate::pipeline::transcribe::ReportBlock;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// MIME type of the exported document.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// File name offered for download.
pub const DEFAULT_FILENAME: &str = "Medical_Report.docx";

/// English Metric Units per inch.
pub const EMU_PER_INCH: u64 = 914_400;

const MAX_HEADING_LEVEL: u8 = 6;
const IMAGE_REL_ID: &str = "rIdImage1";

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Renders reports as Word documents.
#[derive(Debug, Clone)]
pub struct DocxRenderer {
    title: String,
    image_heading: String,
    image_width_emu: u64,
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            image_heading: IMAGE_SECTION_HEADING.to_string(),
            image_width_emu: 6 * EMU_PER_INCH,
        }
    }
}

impl DocxRenderer {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            image_width_emu: config.image_width_emu(),
            ..Self::default()
        }
    }

    pub fn image_width_emu(&self) -> u64 {
        self.image_width_emu
    }

    fn document_xml(&self, report: &Report) -> String {
        let mut body = String::new();
        push_paragraph(&mut body, Some("Title"), false, &self.title);

        for block in report.blocks() {
            match block {
                ReportBlock::Heading { level, text } => {
                    let style = format!("Heading{}", (*level).clamp(1, MAX_HEADING_LEVEL));
                    push_paragraph(&mut body, Some(&style), false, text);
                }
                ReportBlock::BulletItem { text } => {
                    push_paragraph(&mut body, Some("ListBullet"), true, text);
                }
                ReportBlock::Paragraph { text } => {
                    push_paragraph(&mut body, None, false, text);
                }
            }
        }

        push_paragraph(&mut body, Some("Heading1"), false, &self.image_heading);
        self.push_image(&mut body, report);

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="{NS_W}" xmlns:r="{NS_R}" xmlns:wp="{NS_WP}" xmlns:a="{NS_A}" xmlns:pic="{NS_PIC}"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#
        )
    }

    fn push_image(&self, body: &mut String, report: &Report) {
        let image = report.image();
        let cx = self.image_width_emu;
        let cy = image.scaled_height(cx);
        let name = format!("image1.{}", image.kind().extension());

        let _ = write!(
            body,
            r#"<w:p><w:r><w:drawing><wp:inline distT="0" distB="0" distL="0" distR="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="1" name="Picture 1"/><wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr><a:graphic><a:graphicData uri="{NS_PIC}"><pic:pic><pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr><pic:blipFill><a:blip r:embed="{IMAGE_REL_ID}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill><pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#
        );
    }
}

impl ReportRenderer for DocxRenderer {
    fn render(&self, report: &Report) -> Result<Vec<u8>, ScanReportError> {
        let image = report.image();
        let media_path = format!("word/media/image1.{}", image.kind().extension());
        let document = self.document_xml(report);
        let rels = document_rels(image.kind().extension());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let parts: [(&str, &[u8], CompressionMethod); 7] = [
            ("[Content_Types].xml", CONTENT_TYPES.as_bytes(), CompressionMethod::Deflated),
            ("_rels/.rels", PACKAGE_RELS.as_bytes(), CompressionMethod::Deflated),
            ("word/document.xml", document.as_bytes(), CompressionMethod::Deflated),
            ("word/styles.xml", STYLES.as_bytes(), CompressionMethod::Deflated),
            ("word/numbering.xml", NUMBERING.as_bytes(), CompressionMethod::Deflated),
            ("word/_rels/document.xml.rels", rels.as_bytes(), CompressionMethod::Deflated),
            // Already compressed.
            (media_path.as_str(), image.bytes(), CompressionMethod::Stored),
        ];

        for (name, data, method) in parts {
            let options = SimpleFileOptions::default().compression_method(method);
            zip.start_file(name, options)
                .map_err(|e| ScanReportError::ExportFailed(format!("{name}: {e}")))?;
            zip.write_all(data)
                .map_err(|e| ScanReportError::ExportFailed(format!("{name}: {e}")))?;
        }

        let bytes = zip
            .finish()
            .map_err(|e| ScanReportError::ExportFailed(e.to_string()))?
            .into_inner();

        debug!(
            "Rendered DOCX: {} blocks, {} bytes",
            report.blocks().len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

// ── Paragraph helpers ────────────────────────────────────────────────────

static RE_BOLD_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*([^*]+?)\*\*").unwrap());

fn push_paragraph(body: &mut String, style: Option<&str>, bullet: bool, text: &str) {
    body.push_str("<w:p>");
    if style.is_some() || bullet {
        body.push_str("<w:pPr>");
        if let Some(style) = style {
            let _ = write!(body, r#"<w:pStyle w:val="{style}"/>"#);
        }
        if bullet {
            body.push_str(r#"<w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr>"#);
        }
        body.push_str("</w:pPr>");
    }
    // Headings and the title keep their text as one run; inline emphasis
    // only applies to body text.
    if style.is_none() || bullet {
        push_runs(body, text);
    } else if !text.is_empty() {
        push_run(body, text, false);
    }
    body.push_str("</w:p>");
}

/// Split `text` on `**bold**` spans and emit one run per segment.
fn push_runs(body: &mut String, text: &str) {
    let mut last = 0;
    for caps in RE_BOLD_SPAN.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            push_run(body, &text[last..whole.start()], false);
        }
        push_run(body, inner.as_str(), true);
        last = whole.end();
    }
    if last < text.len() {
        push_run(body, &text[last..], false);
    }
}

fn push_run(body: &mut String, text: &str, bold: bool) {
    body.push_str("<w:r>");
    if bold {
        body.push_str("<w:rPr><w:b/></w:rPr>");
    }
    let _ = write!(body, r#"<w:t xml:space="preserve">{}</w:t></w:r>"#, escape_xml(text));
}

/// Escape XML metacharacters and drop characters XML 1.0 cannot carry.
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

// ── Static package parts ─────────────────────────────────────────────────

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Default Extension="jpeg" ContentType="image/jpeg"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/><Override PartName="/word/numbering.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_rels(image_ext: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{REL_BASE}/styles" Target="styles.xml"/><Relationship Id="rId2" Type="{REL_BASE}/numbering" Target="numbering.xml"/><Relationship Id="{IMAGE_REL_ID}" Type="{REL_BASE}/image" Target="media/image1.{image_ext}"/></Relationships>"#
    )
}

static STYLES: Lazy<String> = Lazy::new(|| {
    let mut styles = String::from(
        r#"<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/><w:pPr><w:spacing w:after="120"/></w:pPr><w:rPr><w:sz w:val="22"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:spacing w:after="240"/></w:pPr><w:rPr><w:b/><w:sz w:val="48"/></w:rPr></w:style><w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/><w:basedOn w:val="Normal"/><w:pPr><w:numPr><w:numId w:val="1"/></w:numPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:style>"#,
    );
    for level in 1..=MAX_HEADING_LEVEL {
        let size = 36 - 4 * u32::from(level - 1);
        let _ = write!(
            styles,
            r#"<w:style w:type="paragraph" w:styleId="Heading{level}"><w:name w:val="heading {level}"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:pPr><w:keepNext/><w:spacing w:before="240" w:after="80"/><w:outlineLvl w:val="{outline}"/></w:pPr><w:rPr><w:b/><w:sz w:val="{size}"/></w:rPr></w:style>"#,
            outline = level - 1,
        );
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="{NS_W}">{styles}</w:styles>"#
    )
});

const NUMBERING: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="0"><w:multiLevelType w:val="singleLevel"/><w:lvl w:ilvl="0"><w:start w:val="1"/><w:numFmt w:val="bullet"/><w:lvlText w:val="•"/><w:lvlJc w:val="left"/><w:pPr><w:ind w:left="720" w:hanging="360"/></w:pPr></w:lvl></w:abstractNum><w:num w:numId="1"><w:abstractNumId w:val="0"/></w:num></w:numbering>"#;
